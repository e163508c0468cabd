//! 증분 동기화 도메인 모델.

mod analysis;
mod entity;
mod fiscal;
mod reconcile;
mod record;
mod schema;
mod staleness;
mod upsert;
mod watermark;

pub use analysis::*;
pub use entity::*;
pub use fiscal::*;
pub use reconcile::*;
pub use record::*;
pub use schema::*;
pub use staleness::*;
pub use upsert::*;
pub use watermark::*;
