//! 工具箱：Tool trait、注册表、带超时与审计的执行器，以及三个业务域的工具
//!
//! - 库存：get_farm_yield_inventory、get_all_farms_yield_inventory
//! - 订单：create_order、get_order_details
//! - 诊断：diagnose_infrastructure、analyze_network_blast_radius、trace_network_path、get_network_health、get_network_health_raw

pub mod executor;
pub mod farm;
pub mod network;
pub mod registry;
pub mod schema;

use std::sync::Arc;

use crate::core::ServiceHandles;

pub use executor::ToolExecutor;
pub use farm::{AllFarmsYieldTool, CreateOrderTool, FarmLedger, FarmYieldTool, Order, OrderDetailsTool};
pub use network::{NetworkTool, NetworkToolKind};
pub use registry::{Tool, ToolRegistry};
pub use schema::{args_schema, tool_call_schema_json};

pub const INVENTORY_TOOLS: &[&str] = &["get_farm_yield_inventory", "get_all_farms_yield_inventory"];
pub const ORDERS_TOOLS: &[&str] = &["create_order", "get_order_details"];
pub const DIAGNOSTICS_TOOLS: &[&str] = &[
    "diagnose_infrastructure",
    "analyze_network_blast_radius",
    "trace_network_path",
    "get_network_health",
    "get_network_health_raw",
];

/// 注册三个业务域的全部工具
pub fn register_exchange_tools(
    registry: &mut ToolRegistry,
    ledger: Arc<FarmLedger>,
    handles: Arc<ServiceHandles>,
) {
    registry.register(FarmYieldTool::new(ledger.clone()));
    registry.register(AllFarmsYieldTool::new(ledger.clone()));
    registry.register(CreateOrderTool::new(ledger.clone()));
    registry.register(OrderDetailsTool::new(ledger));
    for tool in NetworkTool::all(handles) {
        registry.register(tool);
    }
}
