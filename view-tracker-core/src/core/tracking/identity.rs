use derive_more::Display;

/// The identity of the tracked video as reported by the player.
///
/// Each field is fetched independently from the player and remains [None] until its fetch resolved.
#[derive(Debug, Display, Default, Clone, PartialEq)]
#[display("id: {:?}, title: {:?}, duration: {:?}", id, title, duration)]
pub struct VideoIdentity {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
}

impl VideoIdentity {
    /// Returns `true` when all metadata fetches have resolved.
    pub fn is_complete(&self) -> bool {
        self.id.is_some() && self.title.is_some() && self.duration.is_some()
    }
}
