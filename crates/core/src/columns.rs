//! Listing columns for the four resource kinds.
//!
//! This module provides:
//! - Column specs (label + width in characters) per kind
//! - Row rendering for an `Entity` matching those specs

#![forbid(unsafe_code)]

use crate::{Entity, ResourceKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: &'static str,
    pub width: usize,
}

fn col(label: &'static str, width: usize) -> ColumnSpec {
    ColumnSpec { label, width }
}

pub fn columns_for(kind: ResourceKind) -> Vec<ColumnSpec> {
    match kind {
        ResourceKind::Container => vec![
            col("ID", 12),
            col("Name", 24),
            col("Image", 28),
            col("State", 10),
            col("Ports", 30),
        ],
        ResourceKind::Image => vec![col("Tag", 40), col("Digest", 19), col("Size", 10)],
        ResourceKind::Volume => vec![col("Name", 32), col("Driver", 10), col("Mountpoint", 48)],
        ResourceKind::Network => vec![col("ID", 12), col("Name", 24), col("Driver", 10), col("Scope", 8)],
    }
}

/// Human size in base-1000 units, matching how runtimes print image sizes.
pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut v = bytes.max(0) as f64;
    let mut u = 0usize;
    while v >= 1000.0 && u + 1 < UNITS.len() {
        v /= 1000.0;
        u += 1;
    }
    if u == 0 { format!("{}{}", bytes.max(0), UNITS[0]) } else { format!("{:.1}{}", v, UNITS[u]) }
}

fn short(id: &str, n: usize) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(n).collect()
}

/// Cell values in the order of `columns_for(entity.kind())`.
pub fn row_for(entity: &Entity) -> Vec<String> {
    match entity {
        Entity::Container(c) => vec![
            short(&c.id, 12),
            c.display_name(),
            c.image.clone(),
            String::from(c.state.clone()),
            c.ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(","),
        ],
        Entity::Image(i) => vec![i.display_name(), short(&i.id, 12), human_size(i.size)],
        Entity::Volume(v) => vec![v.name.clone(), v.driver.clone(), v.mountpoint.clone()],
        Entity::Network(n) => vec![short(&n.id, 12), n.name.clone(), n.driver.clone(), n.scope.clone()],
    }
}

/// Pad/truncate cells to column widths, single space separated.
pub fn format_row(cols: &[ColumnSpec], cells: &[String]) -> String {
    let mut out = String::new();
    for (i, c) in cols.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let mut s: String = cell.chars().take(c.width).collect();
        if i + 1 < cols.len() {
            let pad = c.width.saturating_sub(s.chars().count());
            s.extend(std::iter::repeat(' ').take(pad));
            s.push(' ');
        }
        out.push_str(&s);
    }
    out
}

pub fn header_for(kind: ResourceKind) -> String {
    let cols = columns_for(kind);
    let labels: Vec<String> = cols.iter().map(|c| c.label.to_uppercase()).collect();
    format_row(&cols, &labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Image, Network};

    #[test]
    fn every_kind_row_matches_its_columns() {
        let img = Entity::Image(Image { id: "sha256:0123456789abcdef".into(), repo_tags: vec!["nginx:latest".into()], size: 187_000_000 });
        let row = row_for(&img);
        assert_eq!(row.len(), columns_for(ResourceKind::Image).len());
        assert_eq!(row[1], "0123456789ab");
        assert_eq!(row[2], "187.0MB");

        let net = Entity::Network(Network { id: "abc".into(), name: "bridge".into(), driver: "bridge".into(), scope: "local".into() });
        assert_eq!(row_for(&net).len(), columns_for(ResourceKind::Network).len());
    }

    #[test]
    fn format_row_pads_and_truncates() {
        let cols = vec![col("A", 3), col("B", 2)];
        let s = format_row(&cols, &["abcdef".into(), "xyz".into()]);
        assert_eq!(s, "abc xy");
        let s2 = format_row(&cols, &["a".into()]);
        assert_eq!(s2, "a   ");
    }

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(1_500), "1.5kB");
        assert_eq!(human_size(-3), "0B");
    }
}
