use common::models::timestamp_to_datetime;
use common::{AuthorRecord, CommentRecord, StoryRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Comment,
    Job,
    Poll,
    Pollopt,
    #[default]
    #[serde(other)]
    Unknown,
}

/// An item as served by the HN API. Most fields are optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HNItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub by: String,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub descendants: i64,
    pub text: String,
    pub time: i64,
    pub kids: Vec<i64>,
    pub deleted: bool,
    pub dead: bool,
}

impl HNItem {
    pub fn is_story(&self) -> bool {
        self.kind == ItemKind::Story
    }

    /// A comment that is still visible on the site.
    pub fn is_live_comment(&self) -> bool {
        self.kind == ItemKind::Comment && !self.deleted && !self.dead
    }

    pub fn to_story_record(&self, rank: Option<i32>) -> StoryRecord {
        StoryRecord {
            id: self.id,
            title: self.title.clone(),
            url: self.url.clone(),
            score: self.score,
            author: self.by.clone(),
            descendant_count: self.descendants,
            posted_at: timestamp_to_datetime(self.time),
            rank,
            summary: None,
            topics: None,
        }
    }

    pub fn to_comment_record(&self, story_id: i64, parent_id: Option<i64>) -> CommentRecord {
        CommentRecord {
            id: self.id,
            story_id,
            parent_id,
            text: self.text.clone(),
            author: self.by.clone(),
            posted_at: timestamp_to_datetime(self.time),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HNUser {
    pub id: String,
    pub created: i64,
    pub karma: i64,
    pub about: String,
    pub submitted: Vec<i64>,
}

impl From<HNUser> for AuthorRecord {
    fn from(user: HNUser) -> Self {
        AuthorRecord {
            username: user.id,
            created_at: user.created,
            karma: user.karma,
            about: user.about,
            submitted_ids: user.submitted,
        }
    }
}
