//! Local date and time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};

use toolchat_agent::tools::Tool;

fn no_params() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Today's date as `YYYY-MM-DD`.
pub struct CurrentDateTool;

#[async_trait]
impl Tool for CurrentDateTool {
    fn name(&self) -> &str {
        "get_current_date"
    }

    fn description(&self) -> &str {
        "Get the current system date in YYYY-MM-DD format."
    }

    fn parameters(&self) -> Value {
        no_params()
    }

    async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<String> {
        Ok(Local::now().format("%Y-%m-%d").to_string())
    }
}

/// The time of day as `HH:MM:SS`, 24-hour clock.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current system time in HH:MM:SS format (24-hour clock)."
    }

    fn parameters(&self) -> Value {
        no_params()
    }

    async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<String> {
        Ok(Local::now().format("%H:%M:%S").to_string())
    }
}
