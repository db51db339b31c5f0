//! 农场台账与库存 / 订单工具
//!
//! FarmLedger 是农场代理的进程内替身：每个农场有固定产量，订单创建后可按 id 查询。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub order_id: String,
    pub farm: String,
    pub quantity: u32,
    pub price: f64,
    pub status: String,
}

/// 农场产量与订单簿
///
/// 进程内替身：订单簿随进程存活，只追加不清理，重启即丢失。
#[derive(Debug)]
pub struct FarmLedger {
    /// 农场 -> 产量（lbs）
    yields: BTreeMap<String, u32>,
    orders: Mutex<Vec<Order>>,
}

impl FarmLedger {
    pub fn new(yields: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            yields: yields.into_iter().collect(),
            orders: Mutex::new(Vec::new()),
        }
    }

    /// 演示用三个咖啡农场
    pub fn seeded() -> Self {
        Self::new([
            ("brazil".to_string(), 3200),
            ("colombia".to_string(), 2800),
            ("vietnam".to_string(), 4100),
        ])
    }

    /// 规范化农场名：忽略大小写与 "farm" 后缀
    pub fn resolve(&self, farm: &str) -> Result<String, String> {
        let key = farm.trim().to_lowercase();
        let key = key.trim_end_matches("farm").trim().to_string();
        if self.yields.contains_key(&key) {
            Ok(key)
        } else {
            Err(format!(
                "Unknown farm '{}'. Known farms: {}",
                farm,
                self.farms().join(", ")
            ))
        }
    }

    pub fn farms(&self) -> Vec<String> {
        self.yields.keys().cloned().collect()
    }

    pub fn yield_of(&self, farm: &str) -> Result<u32, String> {
        let key = self.resolve(farm)?;
        Ok(self.yields.get(&key).copied().unwrap_or_default())
    }

    pub fn create_order(&self, farm: &str, quantity: u32, price: f64) -> Result<Order, String> {
        let farm = self.resolve(farm)?;
        if quantity == 0 {
            return Err("Quantity must be greater than zero".to_string());
        }
        if !(price.is_finite() && price > 0.0) {
            return Err("Price must be a positive number".to_string());
        }
        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            farm,
            quantity,
            price,
            status: "confirmed".to_string(),
        };
        self.orders
            .lock()
            .map_err(|_| "Order book unavailable".to_string())?
            .push(order.clone());
        Ok(order)
    }

    pub fn order(&self, order_id: &str) -> Result<Order, String> {
        let orders = self
            .orders
            .lock()
            .map_err(|_| "Order book unavailable".to_string())?;
        orders
            .iter()
            .find(|o| o.order_id == order_id.trim())
            .cloned()
            .ok_or_else(|| format!("Order '{}' not found", order_id))
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))
}

fn describe_order(order: &Order) -> String {
    format!(
        "Order {}: {} lbs from {} at ${:.2}/lb (status: {})",
        order.order_id, order.quantity, order.farm, order.price, order.status
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FarmArgs {
    /// 农场名，如 brazil、colombia、vietnam
    pub farm: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateOrderArgs {
    /// 农场名
    pub farm: String,
    /// 数量（lbs）
    pub quantity: u32,
    /// 每磅价格（USD）
    pub price: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderIdArgs {
    pub order_id: String,
}

/// 查询单个农场产量
pub struct FarmYieldTool {
    ledger: Arc<FarmLedger>,
}

impl FarmYieldTool {
    pub fn new(ledger: Arc<FarmLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for FarmYieldTool {
    fn name(&self) -> &str {
        "get_farm_yield_inventory"
    }

    fn description(&self) -> &str {
        "Get the current coffee yield inventory of one farm."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<FarmArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: FarmArgs = parse_args(args)?;
        let farm = self.ledger.resolve(&args.farm)?;
        let amount = self.ledger.yield_of(&farm)?;
        Ok(format!("{} farm yield: {} lbs of coffee", farm, amount))
    }
}

/// 汇总全部农场产量
pub struct AllFarmsYieldTool {
    ledger: Arc<FarmLedger>,
}

impl AllFarmsYieldTool {
    pub fn new(ledger: Arc<FarmLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for AllFarmsYieldTool {
    fn name(&self) -> &str {
        "get_all_farms_yield_inventory"
    }

    fn description(&self) -> &str {
        "Get the coffee yield inventory of every farm, with the total."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let mut parts = Vec::new();
        let mut total = 0u64;
        for farm in self.ledger.farms() {
            let amount = self.ledger.yield_of(&farm)?;
            total += u64::from(amount);
            parts.push(format!("{}: {} lbs", farm, amount));
        }
        parts.push(format!("total: {} lbs", total));
        Ok(parts.join(" | "))
    }
}

pub struct CreateOrderTool {
    ledger: Arc<FarmLedger>,
}

impl CreateOrderTool {
    pub fn new(ledger: Arc<FarmLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &str {
        "create_order"
    }

    fn description(&self) -> &str {
        "Create a coffee order with a farm for a quantity (lbs) at a price per lb."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CreateOrderArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: CreateOrderArgs = parse_args(args)?;
        let order = self.ledger.create_order(&args.farm, args.quantity, args.price)?;
        tracing::info!(order_id = %order.order_id, farm = %order.farm, "order created");
        Ok(format!("Created {}", describe_order(&order)))
    }
}

pub struct OrderDetailsTool {
    ledger: Arc<FarmLedger>,
}

impl OrderDetailsTool {
    pub fn new(ledger: Arc<FarmLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for OrderDetailsTool {
    fn name(&self) -> &str {
        "get_order_details"
    }

    fn description(&self) -> &str {
        "Look up an existing order by its id."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<OrderIdArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: OrderIdArgs = parse_args(args)?;
        self.ledger.order(&args.order_id).map(|o| describe_order(&o))
    }
}
