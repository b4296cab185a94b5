//! Domain endpoint bindings.
//!
//! Each method builds a path/query string and delegates to the fetch
//! façade; the request path doubles as the cache key, so query strings are
//! built deterministically. Relations are the one endpoint with extra
//! shaping (see [`JikanClient::get_related_anime`]).

use super::client::{Envelope, JikanClient};
use super::types::*;
use crate::error::ApiError;
use tracing::warn;

fn search_query(query: &str, page: u32) -> String {
    let page = page.to_string();
    // Serializing string pairs cannot fail
    serde_urlencoded::to_string(&[("q", query), ("page", page.as_str())]).unwrap_or_default()
}

impl JikanClient {
    /// Fetch full anime details by MAL ID
    pub async fn get_anime_details(&self, id: u32) -> Result<Envelope<Anime>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Anime>>(&format!("/anime/{id}/full"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch the cast of an anime with voice actors
    pub async fn get_anime_characters(
        &self,
        id: u32,
    ) -> Result<Envelope<Vec<CharacterRole>>, ApiError> {
        let envelope = self
            .fetch::<DataList<CharacterRole>>(&format!("/anime/{id}/characters"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch staff credits for an anime
    pub async fn get_anime_staff(&self, id: u32) -> Result<Envelope<Vec<StaffMember>>, ApiError> {
        let envelope = self
            .fetch::<DataList<StaffMember>>(&format!("/anime/{id}/staff"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_pictures(&self, id: u32) -> Result<Envelope<Vec<Images>>, ApiError> {
        let envelope = self
            .fetch::<DataList<Images>>(&format!("/anime/{id}/pictures"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_streaming(
        &self,
        id: u32,
    ) -> Result<Envelope<Vec<StreamingService>>, ApiError> {
        let envelope = self
            .fetch::<DataList<StreamingService>>(&format!("/anime/{id}/streaming"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_statistics(
        &self,
        id: u32,
    ) -> Result<Envelope<AnimeStatistics>, ApiError> {
        let envelope = self
            .fetch::<DataObject<AnimeStatistics>>(&format!("/anime/{id}/statistics"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_recommendations(
        &self,
        id: u32,
    ) -> Result<Envelope<Vec<Recommendation>>, ApiError> {
        let envelope = self
            .fetch::<DataList<Recommendation>>(&format!("/anime/{id}/recommendations"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch one page of reviews for an anime
    pub async fn get_anime_reviews(
        &self,
        id: u32,
        page: u32,
    ) -> Result<Envelope<Page<Review>>, ApiError> {
        self.fetch(&format!("/anime/{id}/reviews?page={page}"), true)
            .await
    }

    pub async fn get_anime_news(&self, id: u32) -> Result<Envelope<Page<NewsItem>>, ApiError> {
        self.fetch(&format!("/anime/{id}/news"), true).await
    }

    /// Fetch one page of the episode list
    pub async fn get_anime_episodes(
        &self,
        id: u32,
        page: u32,
    ) -> Result<Envelope<Page<Episode>>, ApiError> {
        self.fetch(&format!("/anime/{id}/episodes?page={page}"), true)
            .await
    }

    /// Fetch a single episode by number
    pub async fn get_anime_episode(
        &self,
        id: u32,
        episode: u32,
    ) -> Result<Envelope<Episode>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Episode>>(&format!("/anime/{id}/episodes/{episode}"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_forum(&self, id: u32) -> Result<Envelope<Vec<ForumTopic>>, ApiError> {
        let envelope = self
            .fetch::<DataList<ForumTopic>>(&format!("/anime/{id}/forum"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_moreinfo(&self, id: u32) -> Result<Envelope<Moreinfo>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Moreinfo>>(&format!("/anime/{id}/moreinfo"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch the works related to an anime as one flat list.
    ///
    /// Relations are volatile, so the fetch bypasses the cache. Groups with
    /// no usable entry (nothing carrying both an id and a title) are
    /// dropped, and the surviving groups are flattened. Failures degrade to
    /// an empty list: related titles are decorative and must never take a
    /// detail page down with them.
    pub async fn get_related_anime(&self, id: u32) -> Envelope<Vec<RelationEntry>> {
        match self
            .fetch::<DataList<RelationGroup>>(&format!("/anime/{id}/relations"), false)
            .await
        {
            Ok(envelope) => envelope.map(|wrapper| normalize_relations(wrapper.data)),
            Err(error) => {
                warn!(anime_id = id, error = %error, "Failed to fetch related anime");
                Envelope {
                    data: Vec::new(),
                    cached: false,
                    last_modified: None,
                    fingerprint: None,
                }
            }
        }
    }

    /// Fetch full manga details by MAL ID
    pub async fn get_manga_details(&self, id: u32) -> Result<Envelope<Manga>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Manga>>(&format!("/manga/{id}/full"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_manga_characters(
        &self,
        id: u32,
    ) -> Result<Envelope<Vec<CharacterRole>>, ApiError> {
        let envelope = self
            .fetch::<DataList<CharacterRole>>(&format!("/manga/{id}/characters"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_manga_pictures(&self, id: u32) -> Result<Envelope<Vec<Images>>, ApiError> {
        let envelope = self
            .fetch::<DataList<Images>>(&format!("/manga/{id}/pictures"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_manga_statistics(
        &self,
        id: u32,
    ) -> Result<Envelope<MangaStatistics>, ApiError> {
        let envelope = self
            .fetch::<DataObject<MangaStatistics>>(&format!("/manga/{id}/statistics"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_manga_recommendations(
        &self,
        id: u32,
    ) -> Result<Envelope<Vec<Recommendation>>, ApiError> {
        let envelope = self
            .fetch::<DataList<Recommendation>>(&format!("/manga/{id}/recommendations"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_manga_reviews(
        &self,
        id: u32,
        page: u32,
    ) -> Result<Envelope<Page<Review>>, ApiError> {
        self.fetch(&format!("/manga/{id}/reviews?page={page}"), true)
            .await
    }

    pub async fn get_manga_news(&self, id: u32) -> Result<Envelope<Page<NewsItem>>, ApiError> {
        self.fetch(&format!("/manga/{id}/news"), true).await
    }

    pub async fn get_manga_moreinfo(&self, id: u32) -> Result<Envelope<Moreinfo>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Moreinfo>>(&format!("/manga/{id}/moreinfo"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Search anime by free text
    pub async fn search_anime(
        &self,
        query: &str,
        page: u32,
    ) -> Result<Envelope<Page<Anime>>, ApiError> {
        self.fetch(&format!("/anime?{}", search_query(query, page)), true)
            .await
    }

    /// Fetch one page of the overall top anime ranking
    pub async fn get_top_anime(&self, page: u32) -> Result<Envelope<Page<Anime>>, ApiError> {
        self.fetch(&format!("/top/anime?page={page}"), true).await
    }

    /// Fetch the top ranking restricted to one type (tv, movie, ova, ...)
    pub async fn get_top_anime_by_type(
        &self,
        anime_type: &str,
        page: u32,
    ) -> Result<Envelope<Page<Anime>>, ApiError> {
        self.fetch(&format!("/top/anime?type={anime_type}&page={page}"), true)
            .await
    }

    pub async fn get_top_manga(&self, page: u32) -> Result<Envelope<Page<Manga>>, ApiError> {
        self.fetch(&format!("/top/manga?page={page}"), true).await
    }

    /// Fetch the anime of a given season, e.g. (2024, "spring")
    pub async fn get_seasonal_anime(
        &self,
        year: u16,
        season: &str,
    ) -> Result<Envelope<Page<Anime>>, ApiError> {
        self.fetch(&format!("/seasons/{year}/{season}"), true).await
    }

    /// Fetch the currently airing season
    pub async fn get_season_now(&self) -> Result<Envelope<Page<Anime>>, ApiError> {
        self.fetch("/seasons/now", true).await
    }

    pub async fn get_random_anime(&self) -> Result<Envelope<Anime>, ApiError> {
        let envelope = self.fetch::<DataObject<Anime>>("/random/anime", true).await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch the broadcast schedule, optionally for a single weekday
    pub async fn get_schedules(
        &self,
        day: Option<&str>,
    ) -> Result<Envelope<Page<Anime>>, ApiError> {
        match day {
            Some(day) => self.fetch(&format!("/schedules/{day}"), true).await,
            None => self.fetch("/schedules", true).await,
        }
    }

    pub async fn get_producers(&self, page: u32) -> Result<Envelope<Page<Producer>>, ApiError> {
        self.fetch(&format!("/producers?page={page}"), true).await
    }

    pub async fn get_producer(&self, id: u32) -> Result<Envelope<Producer>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Producer>>(&format!("/producers/{id}"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    pub async fn get_anime_genres(&self) -> Result<Envelope<Vec<Genre>>, ApiError> {
        let envelope = self.fetch::<DataList<Genre>>("/genres/anime", true).await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch full character details by MAL ID
    pub async fn get_character_details(&self, id: u32) -> Result<Envelope<Character>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Character>>(&format!("/characters/{id}/full"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }

    /// Fetch full person details by MAL ID
    pub async fn get_person_details(&self, id: u32) -> Result<Envelope<Person>, ApiError> {
        let envelope = self
            .fetch::<DataObject<Person>>(&format!("/people/{id}/full"), true)
            .await?;
        Ok(envelope.map(|wrapper| wrapper.data))
    }
}

/// Keep groups with at least one entry carrying both id and title, then
/// flatten their entries into one list.
fn normalize_relations(groups: Vec<RelationGroup>) -> Vec<RelationEntry> {
    groups
        .into_iter()
        .filter(|group| {
            group
                .entry
                .iter()
                .any(|entry| entry.mal_id.is_some() && entry.title.is_some())
        })
        .flat_map(|group| group.entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::client::ClientOptions;
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_options() -> ClientOptions {
        ClientOptions {
            requests_per_second: 1000,
            requests_per_minute: 10_000,
            retry_delay: Duration::from_millis(10),
            ..ClientOptions::default()
        }
    }

    fn client_for(server: &MockServer) -> JikanClient {
        JikanClient::new(server.uri(), test_options()).unwrap()
    }

    #[tokio::test]
    async fn test_relations_are_filtered_and_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/1/relations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"relation": "Sequel", "entry": [{"mal_id": 5, "title": "X"}]},
                    {"relation": "Other", "entry": []},
                    {"relation": "Adaptation", "entry": [{"mal_id": 7}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let envelope = client.get_related_anime(1).await;
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].mal_id, Some(5));
        assert_eq!(envelope.data[0].title.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_relations_bypass_the_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/1/relations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let first = client.get_related_anime(1).await;
        let second = client.get_related_anime(1).await;
        assert!(!first.cached);
        assert!(!second.cached);
    }

    #[tokio::test]
    async fn test_relations_failure_degrades_to_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/1/relations"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let envelope = client.get_related_anime(1).await;
        assert!(envelope.data.is_empty());
        assert!(!envelope.cached);
    }

    #[tokio::test]
    async fn test_details_fetched_twice_hit_the_network_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/1/full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"mal_id": 1, "title": "Cowboy Bebop", "score": 8.75}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let first = client.get_anime_details(1).await.unwrap();
        let second = client.get_anime_details(1).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.data.mal_id, second.data.mal_id);
        assert_eq!(first.data.title, second.data.title);
    }

    #[tokio::test]
    async fn test_search_query_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime"))
            .and(query_param("q", "fullmetal alchemist"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "pagination": {"last_visible_page": 1, "has_next_page": false}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let envelope = client.search_anime("fullmetal alchemist", 2).await.unwrap();
        assert!(envelope.data.data.is_empty());
    }

    #[tokio::test]
    async fn test_schedules_day_lands_in_the_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/schedules/monday"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        client.get_schedules(Some("monday")).await.unwrap();
    }

    #[tokio::test]
    async fn test_top_anime_type_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/top/anime"))
            .and(query_param("type", "tv"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        client.get_top_anime_by_type("tv", 3).await.unwrap();
    }

    #[test]
    fn test_normalize_relations_keeps_group_partial_entries() {
        // A group qualifies if any entry is complete; once it does, all of
        // its entries are kept.
        let groups = vec![RelationGroup {
            relation: Some("Sequel".to_string()),
            entry: vec![
                RelationEntry {
                    mal_id: Some(5),
                    entity_type: Some("anime".to_string()),
                    title: Some("X".to_string()),
                    url: None,
                },
                RelationEntry {
                    mal_id: Some(9),
                    entity_type: None,
                    title: None,
                    url: None,
                },
            ],
        }];

        let flat = normalize_relations(groups);
        assert_eq!(flat.len(), 2);
    }
}
