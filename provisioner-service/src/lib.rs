//! 幂等的 PostgreSQL 对象管理
//!
//! - `connector`: 每次操作独立打开/关闭连接
//! - `catalog`: 目录查询与 DDL 语句
//! - `provisioner`: 幂等创建、删除与存在性检查
//! - `introspect`: 列出数据库、模式、表与用户
//! - `loader`: 向表中批量写入数据

pub mod catalog;
pub mod connector;
pub mod introspect;
pub mod loader;
pub mod provisioner;

pub use connector::{Connector, PgConnector};
pub use provisioner::Provisioner;
