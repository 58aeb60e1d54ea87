//! Helpers for rendering registry results for terminals and HTTP clients

use crate::config::RegistryOptions;
use crate::gate::GatedListing;
use crate::registry::{LinkDetail, ShortLink};
use serde_json::{Map, Value, json};

/// Combined structured and human-readable representation of a result
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Structured JSON representation suitable for downstream consumers
    pub json: Value,
    /// Human-readable lines for terminal presentation
    pub human: Vec<String>,
}

/// JSON object for a link, including the short URL that QR codes encode.
pub fn link_value(link: &ShortLink, options: &RegistryOptions) -> Value {
    let mut root = Map::new();
    root.insert("id".to_string(), Value::String(link.id.clone()));
    root.insert(
        "short_url".to_string(),
        Value::String(options.short_url(&link.id)),
    );
    root.insert(
        "target_url".to_string(),
        Value::String(link.target_url.clone()),
    );
    root.insert(
        "created_at".to_string(),
        Value::String(link.created_at.to_rfc3339()),
    );
    Value::Object(root)
}

/// Render a freshly created link.
pub fn render_created(link: &ShortLink, options: &RegistryOptions) -> Rendered {
    Rendered {
        json: link_value(link, options),
        human: vec![
            format!("Created short link {}", link.id),
            format!("  Short URL: {}", options.short_url(&link.id)),
            format!("  Target:    {}", link.target_url),
        ],
    }
}

/// Render a gated listing.
pub fn render_listing(listing: &GatedListing, is_pro: bool, options: &RegistryOptions) -> Rendered {
    let links: Vec<Value> = listing
        .links
        .iter()
        .map(|summary| {
            let mut value = link_value(&summary.link, options);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("scan_count".to_string(), Value::from(summary.scan_count));
            }
            value
        })
        .collect();

    let json = json!({
        "links": links,
        "hidden_count": listing.hidden_count,
        "is_pro": is_pro,
    });

    let mut human = Vec::new();
    if listing.links.is_empty() {
        human.push("No short links yet".to_string());
    }
    for summary in &listing.links {
        human.push(format!(
            "{}  {:>6} scans  {}  {}",
            summary.link.id,
            summary.scan_count,
            summary.link.created_at.format("%Y-%m-%d %H:%M"),
            summary.link.target_url
        ));
    }
    if listing.hidden_count > 0 {
        human.push(format!(
            "{} older link(s) hidden, upgrade to pro to see full history",
            listing.hidden_count
        ));
    }

    Rendered { json, human }
}

/// Render one link's scan history.
pub fn render_detail(detail: &LinkDetail, options: &RegistryOptions) -> Rendered {
    let mut json = link_value(&detail.link, options);
    if let Some(obj) = json.as_object_mut() {
        obj.insert("scan_count".to_string(), Value::from(detail.scans.len()));
        obj.insert(
            "scans".to_string(),
            Value::Array(
                detail
                    .scans
                    .iter()
                    .map(|scan| {
                        json!({
                            "id": scan.id,
                            "scanned_at": scan.scanned_at.to_rfc3339(),
                            "user_agent": scan.user_agent,
                        })
                    })
                    .collect(),
            ),
        );
        obj.insert(
            "per_date_counts".to_string(),
            Value::Array(
                detail
                    .per_date_counts
                    .iter()
                    .map(|bucket| {
                        json!({
                            "date": bucket.date.format("%Y-%m-%d").to_string(),
                            "count": bucket.count,
                        })
                    })
                    .collect(),
            ),
        );
    }

    let mut human = vec![
        format!("Short link {}", detail.link.id),
        format!("  Short URL: {}", options.short_url(&detail.link.id)),
        format!("  Target:    {}", detail.link.target_url),
        format!("  Created:   {}", detail.link.created_at.to_rfc3339()),
        format!("  Scans:     {}", detail.scans.len()),
    ];

    if !detail.per_date_counts.is_empty() {
        human.push("  Per day:".to_string());
        for bucket in &detail.per_date_counts {
            human.push(format!("    {}  {}", bucket.date, bucket.count));
        }
    }
    if !detail.scans.is_empty() {
        human.push("  Recent scans:".to_string());
        for scan in &detail.scans {
            human.push(format!(
                "    {}  {}",
                scan.scanned_at.format("%Y-%m-%d %H:%M:%S"),
                scan.user_agent
            ));
        }
    }

    Rendered { json, human }
}
