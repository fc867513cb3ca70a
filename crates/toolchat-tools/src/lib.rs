//! The toolchat tool server: four tools served over stdio.
//!
//! - `get_weather_using_city_name(city_name)`: current weather from weatherapi.com
//! - `get_current_date()`: `YYYY-MM-DD`
//! - `get_current_time()`: `HH:MM:SS`
//! - `read_txt_file(file_path)`: full contents of a text file

pub mod clock;
pub mod error;
pub mod files;
pub mod service;
pub mod weather;

use std::sync::Arc;

use toolchat_agent::tools::ToolRegistry;

pub use error::ToolError;
pub use service::ToolServer;

/// Registry with every tool this server offers.
pub fn build_registry(weather: weather::WeatherTool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(weather));
    registry.register(Arc::new(clock::CurrentDateTool));
    registry.register(Arc::new(clock::CurrentTimeTool));
    registry.register(Arc::new(files::ReadTextFileTool));
    registry
}
