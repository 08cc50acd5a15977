use readshelf_db::BookView;
use serde::{Deserialize, Serialize};

/// Body of `POST /books`. The mobile client sends `rating` as a string, so
/// both forms are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub caption: Option<String>,
    /// Base64 `data:` URL.
    pub image: Option<String>,
    pub rating: Option<RatingInput>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Number(i64),
    Text(String),
}

impl RatingInput {
    /// The rating as an integer, or `None` when the text is not a number.
    pub fn value(&self) -> Option<i64> {
        match self {
            RatingInput::Number(n) => Some(*n),
            RatingInput::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// `?page=&limit=` for the paginated listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of the feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub books: Vec<BookView>,
    pub current_page: u64,
    pub total_books: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}
