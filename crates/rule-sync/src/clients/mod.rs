//! 存储协作方客户端
//!
//! 编排层只依赖这里的两个 trait，测试时可以替换为 mock 实现；
//! HTTP 实现负责连接、超时和错误分类，编排层不做超时控制。

pub mod primary;
pub mod secondary;

pub use primary::{EngineRequest, HttpPrimaryEngine, PrimaryEngine, PrimaryError, PrimaryResult};
pub use secondary::{HttpSecondaryIndex, SecondaryError, SecondaryIndex};

#[cfg(test)]
pub use primary::MockPrimaryEngine;
#[cfg(test)]
pub use secondary::MockSecondaryIndex;
