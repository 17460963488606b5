//! Descriptive names derived from storefront page text.
//!
//! The storefront only exposes human-readable labels, so every archive
//! directory and file name is built from them. All names are lower-cased and
//! stripped of spaces so they are stable across runs; the exact rules differ
//! per label and must not change, since existing archives are matched by name.

/// Item title or file description: lower-cased, spaces become dashes
pub fn title_slug(text: &str) -> String {
    text.to_lowercase().replace(' ', "-")
}

/// Content name: lower-cased, spaces removed
pub fn content_slug(text: &str) -> String {
    text.to_lowercase().replace(' ', "")
}

/// Duration label such as `"02 : 30"`: lower-cased, `" : "` removed
pub fn duration_slug(text: &str) -> String {
    text.to_lowercase().replace(" : ", "")
}

/// Build an item directory name from a `"VOLUME 5:"` label and a title.
///
/// Returns `None` when the volume label does not contain a number.
pub fn item_name(volume_label: &str, title: &str) -> Option<String> {
    let volume: u32 = volume_label
        .replace("VOLUME ", "")
        .replace(':', "")
        .trim()
        .parse()
        .ok()?;

    Some(format!("{:03}-{}", volume, title_slug(title)))
}

/// Turn a "My Downloads" link into the URL of the item's download page.
///
/// Only links containing `|` point at purchases; everything else is
/// navigation and yields `None`.
pub fn download_page_url(href: &str) -> Option<String> {
    if !href.contains('|') {
        return None;
    }

    Some(href.replace("boxx.com/0~", "boxx.com/Downloads?path=0~"))
}

/// Labels of one member of an item's download page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLabel {
    pub title: String,
    pub content: String,
    pub duration: String,
}

impl MemberLabel {
    /// Build a label from the raw texts shown on the page
    pub fn from_page_text(title: &str, content: &str, duration: &str) -> Self {
        Self {
            title: title_slug(title),
            content: content_slug(content),
            duration: duration_slug(duration),
        }
    }

    /// Base name used when the member has a single file
    pub fn base_name(&self) -> String {
        format!("{}-{}-{}", self.title, self.content, self.duration)
    }

    /// Base name for one of several files, keyed by its description text
    pub fn with_description(&self, description: &str) -> String {
        format!("{}-{}", self.base_name(), title_slug(description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs() {
        assert_eq!(title_slug("Modern Titles Pack"), "modern-titles-pack");
        assert_eq!(content_slug("Lower Third 04"), "lowerthird04");
        assert_eq!(duration_slug("00 : 15"), "0015");
    }

    #[test]
    fn test_item_name_pads_volume() {
        assert_eq!(
            item_name("VOLUME 5:", "Modern Titles"),
            Some("005-modern-titles".to_string())
        );
        assert_eq!(
            item_name("VOLUME 123", "Grunge"),
            Some("123-grunge".to_string())
        );
        assert_eq!(item_name("SPECIAL EDITION", "Grunge"), None);
    }

    #[test]
    fn test_download_page_url() {
        assert_eq!(
            download_page_url("https://www.busy-boxx.com/0~abc|def"),
            Some("https://www.busy-boxx.com/Downloads?path=0~abc|def".to_string())
        );
        assert_eq!(download_page_url("https://www.busy-boxx.com/Account"), None);
    }

    #[test]
    fn test_member_label_names() {
        let label = MemberLabel::from_page_text("Neon Glow", "Title 01", "00 : 10");
        assert_eq!(label.base_name(), "neon-glow-title01-0010");
        assert_eq!(
            label.with_description("4K ProRes"),
            "neon-glow-title01-0010-4k-prores"
        );
    }
}
