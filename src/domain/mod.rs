#![allow(unused_imports)]

pub mod entities;
pub mod value_objects;

pub use entities::{Comment, EngagementKind, EngagementRecord, Post, PostStatus};
pub use value_objects::{EngagementState, FeedQuery, Principal, SortKey};
