use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label identifier already encoded into the feed-id namespace by the store.
    pub feed_encoded_id: i64,
    pub caption: String,
    pub fg_color: String,
    pub bg_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub feed_id: i64,
    pub owner_uid: i64,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Read path onto the host's article table, used by manual summarization.
pub trait ArticleSource {
    fn find_article(&self, id: i64, owner_uid: i64) -> Option<Article>;
}

impl ArticleSource for [Article] {
    fn find_article(&self, id: i64, owner_uid: i64) -> Option<Article> {
        self.iter()
            .find(|article| article.id == id && article.owner_uid == owner_uid)
            .cloned()
    }
}
