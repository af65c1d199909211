//! Domain models for imported artworks.

mod artwork;

pub use artwork::{
    normalize_tags, Artwork, MetObject, SearchResponse, ARTWORK_SOURCE_MET,
};
