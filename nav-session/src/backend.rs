use std::collections::BTreeSet;
use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use nav_session_types::{AlgorithmKind, AlgorithmResult, City, CityId, GraphEdge};

use crate::catalog::CityCatalog;
use crate::config::SessionConfig;
use crate::error::BackendError;

/// The whole graph, as `/mapa` and the spanning tree endpoints describe it
#[derive(Deserialize)]
struct MapResponse {
    #[serde(default)]
    nodes: Vec<City>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathResponse {
    #[serde(alias = "distanciaTotalKm")]
    total_distance_km: f64,
    #[serde(alias = "camino")]
    path: Vec<City>,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    lista: &'a [i64],
}

#[derive(Serialize)]
struct ChangeRequest<'a> {
    monto: i64,
    monedas: &'a [i64],
}

#[derive(Serialize)]
struct KnapsackRequest<'a> {
    capacidad: i64,
    items: &'a [KnapsackItem],
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KnapsackItem {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "peso")]
    pub weight: i64,
    #[serde(rename = "valor")]
    pub value: i64,
}

/// Client for the graph algorithm service. It does the actual work; results are passed along
/// as-is.
pub struct GraphBackend {
    http: Client,
    base_url: String,
}

impl GraphBackend {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> reqwest::Result<Self> {
        Self::new(&config.backend_url, config.request_timeout())
    }

    /// Every city and road. The cities make up the catalog endpoints are picked from.
    pub async fn map(&self) -> Result<(CityCatalog, Vec<GraphEdge>), BackendError> {
        let map: MapResponse = self.send(self.http.get(self.url("mapa"))).await?;
        Ok((CityCatalog::new(map.nodes), map.edges))
    }

    pub async fn shortest_path(
        &self,
        from: &CityId,
        to: &CityId,
    ) -> Result<AlgorithmResult, BackendError> {
        let req = self
            .http
            .get(self.url("mapa/dijkstra"))
            .query(&[("origen", &from.0), ("destino", &to.0)]);
        Ok(path_result(self.send(req).await?))
    }

    pub async fn bfs(&self, from: &CityId) -> Result<AlgorithmResult, BackendError> {
        self.traversal("mapa/bfs", from).await
    }

    pub async fn dfs(&self, from: &CityId) -> Result<AlgorithmResult, BackendError> {
        self.traversal("mapa/dfs", from).await
    }

    async fn traversal(&self, path: &str, from: &CityId) -> Result<AlgorithmResult, BackendError> {
        let req = self.http.get(self.url(path)).query(&[("origen", &from.0)]);
        Ok(traversal_result(self.send(req).await?))
    }

    pub async fn prim(&self) -> Result<AlgorithmResult, BackendError> {
        Ok(tree_result(self.send(self.http.get(self.url("mapa/prim"))).await?))
    }

    pub async fn kruskal(&self) -> Result<AlgorithmResult, BackendError> {
        Ok(tree_result(
            self.send(self.http.get(self.url("mapa/kruskal"))).await?,
        ))
    }

    pub async fn quicksort(&self, list: &[i64]) -> Result<Vec<i64>, BackendError> {
        self.post("algoritmos/quicksort", &ListRequest { lista: list })
            .await
    }

    pub async fn mergesort(&self, list: &[i64]) -> Result<Vec<i64>, BackendError> {
        self.post("algoritmos/mergesort", &ListRequest { lista: list })
            .await
    }

    /// The coins handed out for `amount`
    pub async fn greedy_change(
        &self,
        amount: i64,
        coins: &[i64],
    ) -> Result<Vec<i64>, BackendError> {
        self.post(
            "algoritmos/greedy/cambio",
            &ChangeRequest {
                monto: amount,
                monedas: coins,
            },
        )
        .await
    }

    /// The best total value that fits
    pub async fn knapsack_dp(
        &self,
        capacity: i64,
        items: &[KnapsackItem],
    ) -> Result<i64, BackendError> {
        self.post(
            "algoritmos/mochila/dp",
            &KnapsackRequest {
                capacidad: capacity,
                items,
            },
        )
        .await
    }

    pub async fn knapsack_branch_bound(
        &self,
        capacity: i64,
        items: &[KnapsackItem],
    ) -> Result<i64, BackendError> {
        self.post(
            "algoritmos/mochila/branch-bound",
            &KnapsackRequest {
                capacidad: capacity,
                items,
            },
        )
        .await
    }

    pub async fn subsets(&self, list: &[i64]) -> Result<Vec<Vec<i64>>, BackendError> {
        self.post("algoritmos/backtracking/subconjuntos", &ListRequest { lista: list })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        let response = req.send().await?;
        debug!("{} from {}", response.status(), response.url());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response.json().await?)
    }
}

fn path_result(resp: PathResponse) -> AlgorithmResult {
    let nodes: Vec<CityId> = resp.path.into_iter().map(|c| c.id).collect();
    // Consecutive cities along the path are the edges taken. Their lengths aren't reported.
    let edges = nodes
        .windows(2)
        .map(|pair| GraphEdge {
            from: pair[0].clone(),
            to: pair[1].clone(),
            distance_km: 0.0,
        })
        .collect();
    AlgorithmResult {
        kind: AlgorithmKind::Path,
        nodes,
        edges,
        total_distance_km: Some(resp.total_distance_km),
    }
}

fn traversal_result(visited: Vec<City>) -> AlgorithmResult {
    AlgorithmResult {
        kind: AlgorithmKind::Traversal,
        nodes: visited.into_iter().map(|c| c.id).collect(),
        edges: Vec::new(),
        total_distance_km: None,
    }
}

fn tree_result(map: MapResponse) -> AlgorithmResult {
    let nodes = if map.nodes.is_empty() {
        // Every node the tree touches, in the order the edges first reach it
        let mut seen = BTreeSet::new();
        let mut nodes = Vec::new();
        for edge in &map.edges {
            for id in [&edge.from, &edge.to] {
                if seen.insert(id.clone()) {
                    nodes.push(id.clone());
                }
            }
        }
        nodes
    } else {
        map.nodes.into_iter().map(|c| c.id).collect()
    };
    let total = map.edges.iter().map(|e| e.distance_km).sum();
    AlgorithmResult {
        kind: AlgorithmKind::Tree,
        nodes,
        edges: map.edges,
        total_distance_km: Some(total),
    }
}
