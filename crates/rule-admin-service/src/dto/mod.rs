//! 响应数据传输对象

pub mod response;

pub use response::ApiResponse;
