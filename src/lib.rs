//! 资产清单库
//! 资产、资产组、凭据与会话的领域模型、仓库与服务

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
