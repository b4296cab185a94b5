//! Jikan API v4 response types.
//!
//! These types represent the JSON responses from the Jikan API. Fields the
//! provider documents as nullable are `Option`; list fields default to
//! empty so a sparse payload still deserializes.

use serde::{Deserialize, Serialize};

/// Generic pagination wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// List wrapper (without pagination)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataList<T> {
    pub data: Vec<T>,
}

/// Single-object wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataObject<T> {
    pub data: T,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub last_visible_page: u32,
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Image variants for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Images {
    #[serde(default)]
    pub jpg: Option<ImageSet>,
    #[serde(default)]
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSet {
    pub image_url: Option<String>,
    #[serde(default)]
    pub small_image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

/// MAL entity reference (genre, studio, producer, author, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalEntity {
    pub mal_id: u32,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Airing/publishing date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
}

/// Broadcast information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub day: Option<String>,
    pub time: Option<String>,
    pub timezone: Option<String>,
    pub string: Option<String>,
}

/// Full anime details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,

    // Titles
    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub title_synonyms: Vec<String>,

    // Type and status
    #[serde(rename = "type", default)]
    pub anime_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub airing: bool,

    // Dates
    #[serde(default)]
    pub aired: Option<DateRange>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,

    // Scores and rankings
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub scored_by: Option<u64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub members: Option<u64>,
    #[serde(default)]
    pub favorites: Option<u64>,

    // Synopsis
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub background: Option<String>,

    // Season
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,

    // Producers, licensors, studios, categories
    #[serde(default)]
    pub producers: Vec<MalEntity>,
    #[serde(default)]
    pub licensors: Vec<MalEntity>,
    #[serde(default)]
    pub studios: Vec<MalEntity>,
    #[serde(default)]
    pub genres: Vec<MalEntity>,
    #[serde(default)]
    pub explicit_genres: Vec<MalEntity>,
    #[serde(default)]
    pub themes: Vec<MalEntity>,
    #[serde(default)]
    pub demographics: Vec<MalEntity>,
}

/// Full manga details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manga {
    pub mal_id: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,

    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,

    #[serde(rename = "type", default)]
    pub manga_type: Option<String>,
    #[serde(default)]
    pub chapters: Option<u32>,
    #[serde(default)]
    pub volumes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub publishing: bool,
    #[serde(default)]
    pub published: Option<DateRange>,

    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub scored_by: Option<u64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub members: Option<u64>,
    #[serde(default)]
    pub favorites: Option<u64>,

    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub background: Option<String>,

    #[serde(default)]
    pub authors: Vec<MalEntity>,
    #[serde(default)]
    pub serializations: Vec<MalEntity>,
    #[serde(default)]
    pub genres: Vec<MalEntity>,
    #[serde(default)]
    pub themes: Vec<MalEntity>,
    #[serde(default)]
    pub demographics: Vec<MalEntity>,
}

/// Character as cast in an anime/manga, with role and voice actors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRole {
    pub character: CharacterRef,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub voice_actors: Vec<VoiceActor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRef {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceActor {
    pub person: PersonRef,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRef {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Staff credit on an anime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub person: PersonRef,
    #[serde(default)]
    pub positions: Vec<String>,
}

/// Standalone character details (`/characters/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub name_kanji: Option<String>,
    #[serde(default)]
    pub nicknames: Vec<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub favorites: Option<u64>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Standalone person details (`/people/{id}/full`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub favorites: Option<u64>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Streaming service link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingService {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Viewing statistics for an anime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeStatistics {
    #[serde(default)]
    pub watching: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub on_hold: Option<u64>,
    #[serde(default)]
    pub dropped: Option<u64>,
    #[serde(default)]
    pub plan_to_watch: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub scores: Vec<ScoreBucket>,
}

/// Reading statistics for a manga
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaStatistics {
    #[serde(default)]
    pub reading: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub on_hold: Option<u64>,
    #[serde(default)]
    pub dropped: Option<u64>,
    #[serde(default)]
    pub plan_to_read: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub scores: Vec<ScoreBucket>,
}

/// One bar of the score distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub score: u32,
    pub votes: u64,
    pub percentage: f64,
}

/// Recommendation ("users who liked this also liked...")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub entry: RecommendationEntry,
    #[serde(default)]
    pub votes: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub mal_id: u32,
    pub title: String,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Group of related works sharing one relation label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationGroup {
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub entry: Vec<RelationEntry>,
}

/// A related work. Everything is optional: the upstream payload is
/// inconsistent here and the normalization step filters on presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEntry {
    #[serde(default)]
    pub mal_id: Option<u64>,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// User review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub mal_id: Option<u64>,
    #[serde(rename = "type", default)]
    pub review_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_spoiler: Option<bool>,
    #[serde(default)]
    pub is_preliminary: Option<bool>,
    #[serde(default)]
    pub user: Option<ReviewUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
}

/// News article attached to a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub mal_id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub forum_url: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

/// Episode listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    #[serde(default)]
    pub mal_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub title_romanji: Option<String>,
    #[serde(default)]
    pub aired: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub filler: Option<bool>,
    #[serde(default)]
    pub recap: Option<bool>,
    #[serde(default)]
    pub forum_url: Option<String>,
}

/// Forum topic attached to a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumTopic {
    #[serde(default)]
    pub mal_id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub comments: Option<u64>,
}

/// Free-form supplemental text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moreinfo {
    #[serde(default)]
    pub moreinfo: Option<String>,
}

/// Producer/Studio details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub mal_id: u32,
    #[serde(default)]
    pub titles: Vec<ProducerTitle>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub favorites: Option<u64>,
    #[serde(default)]
    pub established: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerTitle {
    #[serde(rename = "type")]
    pub title_type: String,
    pub title: String,
}

/// Genre/Theme/Demographic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub mal_id: u32,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
}
