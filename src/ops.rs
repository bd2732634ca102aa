//! Operators
//!
//! Each operator is a publisher wrapping its source, built through the
//! methods of [`PublisherExt`](crate::publisher::PublisherExt). Most of them
//! forward the downstream subscription untouched and only rewrite the events;
//! the combinators that join several upstreams (`merge`, `flat_map`,
//! `combine_latest`, `switch_to_latest`) own a delivery node that splits
//! downstream demand among them.

pub mod catch;
pub mod collect;
pub mod combine_latest;
pub mod decode;
pub mod filter;
pub mod flat_map;
pub mod handle_events;
pub mod into_stream;
mod lanes;
pub mod map;
pub mod merge;
pub mod multicast;
pub mod prepend;
pub mod receive_on;
mod relay;
pub mod scan;
pub mod share;
pub mod sink;
pub mod subscribe_on;
pub mod switch_to_latest;
pub mod take;
