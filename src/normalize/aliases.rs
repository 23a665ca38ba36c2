//! Alias tables
//!
//! All lookups are case-insensitive. Column names are additionally matched
//! with spaces, underscores and dashes removed, so `Source URL`, `source_url`
//! and `sourceUrl` all resolve to the same field.

use crate::types::{Field, SourcePlatform, SourceType};

/// Resolve a raw column name to a canonical field
pub fn resolve_field(column: &str) -> Option<Field> {
    let field = match column_key(column).as_str() {
        "mkid" | "mk" | "memberid" | "member" | "knessetmemberid" => Field::MkId,
        "content" | "text" | "quote" | "comment" | "statement" | "body" => Field::Content,
        "sourceurl" | "url" | "source" | "link" | "href" | "articleurl" => Field::SourceUrl,
        "sourceplatform" | "platform" | "medium" | "channel" => Field::SourcePlatform,
        "sourcetype" | "type" => Field::SourceType,
        "commentdate" | "date" | "publishedat" | "published" | "publishdate" | "timestamp"
        | "createdat" => Field::CommentDate,
        "sourcename" | "outlet" | "publisher" | "medianame" => Field::SourceName,
        "sourcecredibility" | "credibility" | "reliability" => Field::SourceCredibility,
        "imageurl" | "image" | "img" | "thumbnail" => Field::ImageUrl,
        "videourl" | "video" => Field::VideoUrl,
        "additionalcontext" | "context" | "notes" | "note" | "description" => {
            Field::AdditionalContext
        }
        _ => return None,
    };

    Some(field)
}

/// Whether the column spells a canonical field name rather than an alias
pub fn is_canonical_column(column: &str) -> bool {
    resolve_field(column).is_some_and(|field| column_key(column) == field.as_str().to_lowercase())
}

fn column_key(column: &str) -> String {
    column
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a platform name or alias to the closed platform enum
pub fn resolve_platform(value: &str) -> Option<SourcePlatform> {
    let platform = match value.trim().to_lowercase().as_str() {
        "news" | "article" | "newspaper" | "press" | "web" | "חדשות" | "כתבה" => {
            SourcePlatform::News
        }
        "twitter" | "x" | "tweet" | "x.com" | "טוויטר" => SourcePlatform::Twitter,
        "facebook" | "fb" | "meta" | "פייסבוק" => SourcePlatform::Facebook,
        "youtube" | "yt" | "יוטיוב" => SourcePlatform::YouTube,
        "knesset" | "plenum" | "committee" | "כנסת" | "מליאה" | "ועדה" => {
            SourcePlatform::Knesset
        }
        "interview" | "radio" | "tv" | "television" | "podcast" | "ראיון" => {
            SourcePlatform::Interview
        }
        "other" | "אחר" => SourcePlatform::Other,
        _ => return None,
    };

    Some(platform)
}

/// Resolve a source type name or alias
pub fn resolve_source_type(value: &str) -> Option<SourceType> {
    match value.trim().to_lowercase().as_str() {
        "primary" | "direct" | "ראשי" | "ראשוני" => Some(SourceType::Primary),
        "secondary" | "indirect" | "משני" => Some(SourceType::Secondary),
        _ => None,
    }
}
