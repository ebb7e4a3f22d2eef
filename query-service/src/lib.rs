//! 只读 SQL 查询执行
//!
//! - `executor`: 打开连接、校验并执行 SELECT，将结果转换为 JSON
//! - `render`: 将查询结果渲染为文本表格

pub mod executor;
pub mod render;

pub use executor::{QueryService, SqlSource};
pub use render::render_table;
