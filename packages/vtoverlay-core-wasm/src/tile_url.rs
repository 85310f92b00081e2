// Tile URL construction: template substitution plus static query fields
use crate::config::LayerOptions;
use crate::models::TileCoord;

/// Fill `{s}`, `{x}`, `{y}`, `{-y}` and `{z}` in the template for `coord`.
pub fn expand_template(options: &LayerOptions, coord: &TileCoord) -> String {
    let y = if options.tms { coord.tms_y() } else { coord.y };
    let mut url = options
        .url
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &y.to_string())
        .replace("{-y}", &coord.tms_y().to_string())
        .replace("{z}", &coord.z.to_string());

    if url.contains("{s}") {
        let subdomain = if options.subdomains.is_empty() {
            String::new()
        } else {
            let index = (coord.x as usize + coord.y as usize) % options.subdomains.len();
            options.subdomains[index].clone()
        };
        url = url.replace("{s}", &subdomain);
    }
    url
}

/// Append `key=value` pairs, starting with `?` only if the URL has no query yet.
pub fn append_query<'a, I>(url: &mut String, fields: I)
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut has_params = url.contains('?');
    for (field, value) in fields {
        url.push(if has_params { '&' } else { '?' });
        has_params = true;
        url.push_str(field);
        url.push('=');
        url.push_str(value);
    }
}

/// Full request URL for a tile.
pub fn build_tile_url(options: &LayerOptions, coord: &TileCoord) -> String {
    let mut url = expand_template(options, coord);
    append_query(&mut url, &options.query);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(url: &str) -> LayerOptions {
        LayerOptions {
            url: url.to_string(),
            layer_name: "roads".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_template() {
        let opts = options("https://{s}.tiles.example/{z}/{x}/{y}.pbf");
        let url = expand_template(&opts, &TileCoord::new(2, 3, 5));
        // (2 + 3) % 3 picks the third subdomain
        assert_eq!(url, "https://c.tiles.example/5/2/3.pbf");
    }

    #[test]
    fn test_tms_flips_y() {
        let opts = LayerOptions {
            tms: true,
            ..options("https://tiles.example/{z}/{x}/{y}.pbf")
        };
        assert_eq!(
            expand_template(&opts, &TileCoord::new(2, 3, 5)),
            "https://tiles.example/5/2/28.pbf"
        );
    }

    #[test]
    fn test_query_starts_with_question_mark() {
        let mut opts = options("https://tiles.example/{z}/{x}/{y}.pbf");
        opts.query.insert("key".to_string(), "abc".to_string());
        opts.query.insert("lang".to_string(), "de".to_string());
        assert_eq!(
            build_tile_url(&opts, &TileCoord::new(1, 1, 2)),
            "https://tiles.example/2/1/1.pbf?key=abc&lang=de"
        );
    }

    #[test]
    fn test_query_extends_existing_params() {
        let mut opts = options("https://tiles.example/{z}/{x}/{y}.pbf?v=2");
        opts.query.insert("key".to_string(), "abc".to_string());
        assert_eq!(
            build_tile_url(&opts, &TileCoord::new(1, 1, 2)),
            "https://tiles.example/2/1/1.pbf?v=2&key=abc"
        );
    }

    #[test]
    fn test_no_query_leaves_url_alone() {
        let opts = options("https://tiles.example/{z}/{x}/{y}.pbf");
        assert_eq!(
            build_tile_url(&opts, &TileCoord::new(0, 0, 0)),
            "https://tiles.example/0/0/0.pbf"
        );
    }
}
