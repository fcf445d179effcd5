use askama::Template;
use askama_axum::IntoResponse;
use axum::response::Response;

use crate::models::FileRecord;

/// One row of the public listing.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub id: String,
    pub filename: String,
    pub filesize: i64,
}

#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingTemplate {
    pub files: Vec<ListingRow>,
}

pub fn render(records: &[FileRecord]) -> Response {
    let files = records
        .iter()
        .map(|r| ListingRow {
            id: r.id.clone(),
            filename: r.filename.clone(),
            filesize: r.filesize,
        })
        .collect();

    ListingTemplate { files }.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_link_to_download() {
        let html = ListingTemplate {
            files: vec![ListingRow {
                id: "abc".to_string(),
                filename: "<script>.txt".to_string(),
                filesize: 7,
            }],
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"href="/void?id=abc""#));
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(html.contains("<td>7</td>"));
    }
}
