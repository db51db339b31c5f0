//! 进程内网络拓扑
//!
//! 设备经由链路相连（upstream -> link -> downstream），服务运行在设备上。
//! 种子数据：1 台核心路由器、3 台汇聚交换机、3 台 ToR 交换机、6 台服务器，共 12 条链路、7 个服务。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use super::{GraphOperation, GraphQueryService};

/// 利用率超过该值视为问题链路
const HIGH_UTILIZATION: u32 = 80;

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub id: String,
    pub status: String,
    pub utilization: u32,
    pub bandwidth: String,
    /// 靠近核心的一端
    pub upstream: String,
    pub downstream: String,
}

impl Link {
    pub fn is_degraded(&self) -> bool {
        self.status == "degraded"
    }

    fn is_problem(&self) -> bool {
        self.is_degraded() || self.utilization > HIGH_UTILIZATION
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub name: String,
    pub critical: bool,
    pub port: u16,
    pub host: String,
    pub depends_on: Vec<String>,
}

impl Service {
    fn label(&self) -> String {
        if self.critical {
            format!("{} [CRITICAL]", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTopology {
    devices: Vec<Device>,
    links: Vec<Link>,
    services: Vec<Service>,
}

fn device(name: &str, kind: &str, location: &str) -> Device {
    Device {
        name: name.into(),
        kind: kind.into(),
        location: location.into(),
    }
}

fn link(id: &str, status: &str, utilization: u32, bandwidth: &str, upstream: &str, downstream: &str) -> Link {
    Link {
        id: id.into(),
        status: status.into(),
        utilization,
        bandwidth: bandwidth.into(),
        upstream: upstream.into(),
        downstream: downstream.into(),
    }
}

fn service(name: &str, critical: bool, port: u16, host: &str, depends_on: &[&str]) -> Service {
    Service {
        name: name.into(),
        critical,
        port,
        host: host.into(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
    }
}

impl InMemoryTopology {
    pub fn new(devices: Vec<Device>, links: Vec<Link>, services: Vec<Service>) -> Self {
        Self {
            devices,
            links,
            services,
        }
    }

    /// 演示用种子拓扑：datacenter-2 方向的两条链路处于 degraded
    pub fn seeded() -> Self {
        let devices = vec![
            device("core-router-1", "router", "datacenter-1"),
            device("agg-switch-1", "switch", "datacenter-1"),
            device("agg-switch-2", "switch", "datacenter-1"),
            device("agg-switch-3", "switch", "datacenter-2"),
            device("dist-switch-1", "tor-switch", "rack-1"),
            device("dist-switch-2", "tor-switch", "rack-2"),
            device("dist-switch-3", "tor-switch", "rack-3"),
            device("app-server-1", "server", "rack-1"),
            device("db-server-1", "server", "rack-2"),
            device("mcp-server-1", "server", "rack-2"),
            device("farm-server-brazil", "server", "rack-3"),
            device("farm-server-colombia", "server", "rack-3"),
            device("farm-server-vietnam", "server", "rack-3"),
        ];
        let links = vec![
            link("link-core-agg1", "active", 45, "10Gbps", "core-router-1", "agg-switch-1"),
            link("link-core-agg2", "active", 52, "10Gbps", "core-router-1", "agg-switch-2"),
            link("link-core-agg3", "degraded", 87, "10Gbps", "core-router-1", "agg-switch-3"),
            link("link-agg1-dist1", "active", 35, "1Gbps", "agg-switch-1", "dist-switch-1"),
            link("link-agg2-dist2", "active", 62, "1Gbps", "agg-switch-2", "dist-switch-2"),
            link("link-agg3-dist3", "degraded", 91, "1Gbps", "agg-switch-3", "dist-switch-3"),
            link("link-d1-srv1", "active", 25, "1Gbps", "dist-switch-1", "app-server-1"),
            link("link-d2-srv2", "active", 78, "1Gbps", "dist-switch-2", "db-server-1"),
            link("link-d2-srv3", "active", 40, "1Gbps", "dist-switch-2", "mcp-server-1"),
            link("link-d3-srv4", "active", 30, "1Gbps", "dist-switch-3", "farm-server-brazil"),
            link("link-d3-srv5", "active", 28, "1Gbps", "dist-switch-3", "farm-server-colombia"),
            link("link-d3-srv6", "active", 32, "1Gbps", "dist-switch-3", "farm-server-vietnam"),
        ];
        let services = vec![
            service(
                "lungo_auction_supervisor",
                true,
                8000,
                "app-server-1",
                &["postgresql_orders", "slim_gateway"],
            ),
            service("postgresql_orders", true, 5432, "db-server-1", &[]),
            service("weather_service", false, 8125, "mcp-server-1", &[]),
            service("slim_gateway", true, 46357, "app-server-1", &[]),
            service("brazil_farm_agent", false, 9999, "farm-server-brazil", &["slim_gateway"]),
            service(
                "colombia_farm_agent",
                false,
                9999,
                "farm-server-colombia",
                &["slim_gateway", "weather_service"],
            ),
            service("vietnam_farm_agent", false, 9999, "farm-server-vietnam", &["slim_gateway"]),
        ];
        Self::new(devices, links, services)
    }

    /// 修改链路状态；链路不存在时返回 false
    pub fn update_link(&mut self, id: &str, status: &str, utilization: u32) -> bool {
        match self.links.iter_mut().find(|l| l.id == id) {
            Some(l) => {
                l.status = status.to_string();
                l.utilization = utilization;
                true
            }
            None => false,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// 从设备向核心方向经过的链路，按跳数排序
    fn upstream_links(&self, device: &str) -> Vec<&Link> {
        let mut out = Vec::new();
        let mut current = device;
        for _ in 0..self.links.len() {
            match self.links.iter().find(|l| l.downstream == current) {
                Some(link) => {
                    out.push(link);
                    current = &link.upstream;
                }
                None => break,
            }
        }
        out
    }

    /// 链路下游的全部设备（BFS，保持种子顺序）
    fn downstream_devices(&self, link: &Link) -> Vec<String> {
        let mut out = vec![link.downstream.clone()];
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for next in self.links.iter().filter(|l| l.upstream == current) {
                if !out.contains(&next.downstream) {
                    out.push(next.downstream.clone());
                }
            }
            i += 1;
        }
        out
    }

    pub fn network_health(&self) -> String {
        let degraded: Vec<String> = self
            .links
            .iter()
            .filter(|l| l.is_degraded())
            .map(|l| format!("{} ({}%)", l.id, l.utilization))
            .collect();
        let critical: Vec<&str> = self
            .services
            .iter()
            .filter(|s| s.critical)
            .map(|s| s.name.as_str())
            .collect();
        let total = self.links.len();

        if degraded.is_empty() {
            format!(
                "HEALTHY | All {} links operational | Critical services: {} | {} devices total",
                total,
                critical.join(", "),
                self.devices.len()
            )
        } else {
            format!(
                "DEGRADED | {} of {} links down: {} | Critical services: {} | {} devices total",
                degraded.len(),
                total,
                degraded.join(", "),
                critical.join(", "),
                self.devices.len()
            )
        }
    }

    pub fn network_health_raw(&self) -> Result<String, String> {
        let connections: Vec<_> = self
            .links
            .iter()
            .map(|l| json!({ "from": l.upstream, "via": l.id, "to": l.downstream }))
            .collect();
        serde_json::to_string_pretty(&json!({
            "devices": self.devices,
            "links": self.links,
            "services": self.services,
            "connections": connections,
        }))
        .map_err(|e| e.to_string())
    }

    pub fn upstream_path(&self, service_name: &str) -> String {
        let Some(svc) = self.service(service_name) else {
            return format!("Service '{}' not found", service_name);
        };
        let path: Vec<&str> = self
            .upstream_links(&svc.host)
            .into_iter()
            .map(|l| l.upstream.as_str())
            .collect();
        if path.is_empty() {
            format!("{} → {} (no upstream path found)", svc.name, svc.host)
        } else {
            format!("{} → {} → {}", svc.name, svc.host, path.join(" → "))
        }
    }

    pub fn blast_radius(&self, link_id: &str) -> String {
        let Some(link) = self.links.iter().find(|l| l.id == link_id) else {
            return format!("Link '{}' not found", link_id);
        };
        let devices = self.downstream_devices(link);
        let impacted: Vec<&Service> = self
            .services
            .iter()
            .filter(|s| devices.contains(&s.host))
            .collect();
        let risk = if impacted.iter().any(|s| s.critical) {
            "CRITICAL"
        } else if !impacted.is_empty() {
            "MODERATE"
        } else {
            "LOW"
        };

        let mut answer = format!(
            "{} ({}, {}% util) | Risk: {} | Affects: {}",
            link.id,
            link.status,
            link.utilization,
            risk,
            if devices.is_empty() {
                "no devices".to_string()
            } else {
                devices.join(", ")
            }
        );
        if !impacted.is_empty() {
            let labels: Vec<String> = impacted.iter().map(|s| s.label()).collect();
            answer.push_str(&format!(" | Services impacted: {}", labels.join(", ")));
        }
        answer
    }

    pub fn diagnose_service(&self, service_name: &str, issue_type: &str) -> String {
        let Some(svc) = self.service(service_name) else {
            return format!("Service '{}' not found", service_name);
        };
        tracing::debug!(service = service_name, issue_type, "diagnose");

        let location = self
            .device(&svc.host)
            .map(|d| d.location.as_str())
            .unwrap_or("unknown");
        let crit_tag = if svc.critical { " [CRITICAL]" } else { "" };
        let problems: Vec<String> = self
            .upstream_links(&svc.host)
            .into_iter()
            .filter(|l| l.is_problem())
            .map(|l| format!("{} ({}, {}%)", l.id, l.status, l.utilization))
            .collect();

        if problems.is_empty() {
            format!(
                "{}{} on {} ({}) | No infrastructure issues | Recommendation: Check application logs",
                svc.name, crit_tag, svc.host, location
            )
        } else {
            format!(
                "{}{} on {} ({}) | ISSUES FOUND: {} | Recommendation: Check network links",
                svc.name,
                crit_tag,
                svc.host,
                location,
                problems.join(", ")
            )
        }
    }
}

#[async_trait]
impl GraphQueryService for InMemoryTopology {
    async fn query(&self, operation: &GraphOperation) -> Result<String, String> {
        match operation {
            GraphOperation::NetworkHealth => Ok(self.network_health()),
            GraphOperation::NetworkHealthRaw => self.network_health_raw(),
            GraphOperation::UpstreamPath { service_name } => Ok(self.upstream_path(service_name)),
            GraphOperation::BlastRadius { link_id } => Ok(self.blast_radius(link_id)),
            GraphOperation::DiagnoseService {
                service_name,
                issue_type,
            } => Ok(self.diagnose_service(service_name, issue_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRITICAL: &str = "Critical services: lungo_auction_supervisor, postgresql_orders, slim_gateway";

    #[test]
    fn test_seeded_counts() {
        let topo = InMemoryTopology::seeded();
        assert_eq!(topo.devices().len(), 13);
        assert_eq!(topo.links().len(), 12);
        assert_eq!(topo.services().len(), 7);
    }

    #[test]
    fn test_network_health_degraded_and_healthy() {
        let mut topo = InMemoryTopology::seeded();
        assert_eq!(
            topo.network_health(),
            format!(
                "DEGRADED | 2 of 12 links down: link-core-agg3 (87%), link-agg3-dist3 (91%) | {} | 13 devices total",
                CRITICAL
            )
        );

        assert!(topo.update_link("link-core-agg3", "active", 40));
        assert!(topo.update_link("link-agg3-dist3", "active", 40));
        assert!(!topo.update_link("link-missing", "active", 0));
        assert_eq!(
            topo.network_health(),
            format!("HEALTHY | All 12 links operational | {} | 13 devices total", CRITICAL)
        );
    }

    #[test]
    fn test_upstream_path() {
        let topo = InMemoryTopology::seeded();
        assert_eq!(
            topo.upstream_path("brazil_farm_agent"),
            "brazil_farm_agent → farm-server-brazil → dist-switch-3 → agg-switch-3 → core-router-1"
        );
        assert_eq!(topo.upstream_path("ghost"), "Service 'ghost' not found");
    }

    #[test]
    fn test_blast_radius_covers_downstream() {
        let topo = InMemoryTopology::seeded();
        assert_eq!(
            topo.blast_radius("link-core-agg3"),
            "link-core-agg3 (degraded, 87% util) | Risk: MODERATE | Affects: agg-switch-3, dist-switch-3, \
             farm-server-brazil, farm-server-colombia, farm-server-vietnam | Services impacted: \
             brazil_farm_agent, colombia_farm_agent, vietnam_farm_agent"
        );
        assert!(topo
            .blast_radius("link-d1-srv1")
            .contains("Risk: CRITICAL | Affects: app-server-1 | Services impacted: lungo_auction_supervisor [CRITICAL], slim_gateway [CRITICAL]"));
        assert_eq!(topo.blast_radius("nope"), "Link 'nope' not found");
    }

    #[test]
    fn test_diagnose_checks_whole_path() {
        let topo = InMemoryTopology::seeded();
        assert_eq!(
            topo.diagnose_service("brazil_farm_agent", "timeout"),
            "brazil_farm_agent on farm-server-brazil (rack-3) | ISSUES FOUND: link-agg3-dist3 (degraded, 91%), \
             link-core-agg3 (degraded, 87%) | Recommendation: Check network links"
        );
        assert_eq!(
            topo.diagnose_service("postgresql_orders", "timeout"),
            "postgresql_orders [CRITICAL] on db-server-1 (rack-2) | No infrastructure issues | \
             Recommendation: Check application logs"
        );
    }

    #[tokio::test]
    async fn test_raw_dump_is_json() {
        let topo = InMemoryTopology::seeded();
        let raw = topo.query(&GraphOperation::NetworkHealthRaw).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["devices"].as_array().unwrap().len(), 13);
        assert_eq!(value["connections"][0]["via"], "link-core-agg1");
        assert_eq!(value["devices"][0]["type"], "router");
    }
}
