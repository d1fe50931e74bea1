//! Typed scrape endpoints (§4.E), grounded on the pagination-loop and
//! tolerant-response-shape idioms in
//! `examples/cooprefr-bettersys/.../scrapers/dome_rest.rs`, adapted to the
//! auction API's endpoint family named in SPEC_FULL.md §6.

use serde_json::Value;

use crate::config::EndpointConfig;
use crate::crawler::base::CrawlerSession;

/// Accepts: a bare array; `{data|list|records: [...]}`; `{bids|records|list: [...]}`
/// (treated the same as above); or `{data: {<key>: [...]}}` where the first
/// array-valued entry wins. The last shape is flagged per SPEC_FULL.md §9.
pub fn normalize_list(value: &Value) -> Vec<Value> {
    if let Some(arr) = value.as_array() {
        return arr.clone();
    }
    let Some(obj) = value.as_object() else {
        return Vec::new();
    };
    for key in ["data", "list", "records", "bids"] {
        if let Some(arr) = obj.get(key).and_then(Value::as_array) {
            return arr.clone();
        }
    }
    if let Some(Value::Object(inner)) = obj.get("data") {
        for (_k, v) in inner.iter() {
            if let Some(arr) = v.as_array() {
                tracing::warn!("ledger response used non-canonical {{data:{{<key>:[...]}}}} shape");
                return arr.clone();
            }
        }
    }
    Vec::new()
}

fn params_vec(cfg: &EndpointConfig) -> Vec<(&str, &str)> {
    cfg.params_template
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// `crawl_all`: paginate `pageno` from 1 at fixed `pagesize` until a short or
/// empty page is returned.
pub fn crawl_all_auctions(session: &CrawlerSession, cfg: &EndpointConfig) -> Vec<Value> {
    let mut out = Vec::new();
    let mut pageno = 1u32;
    loop {
        let pageno_s = pageno.to_string();
        let pagesize_s = cfg.pagesize.to_string();
        let mut params = params_vec(cfg);
        params.push(("pageno", &pageno_s));
        params.push(("pagesize", &pagesize_s));

        let Some(resp) = session.fetch(&cfg.url_template, &params, &[]) else {
            tracing::warn!(pageno, "auction list page fetch failed, stopping pagination");
            break;
        };
        let body: Value = match resp.json() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "auction list page: bad json");
                break;
            }
        };
        let page = normalize_list(&body);
        let page_len = page.len();
        out.extend(page);
        if page_len == 0 || (page_len as u32) < cfg.pagesize {
            break;
        }
        pageno += 1;
    }
    out
}

pub fn fetch_sections(session: &CrawlerSession, cfg: &EndpointConfig, auction_id: i64) -> Vec<Value> {
    let auction_id_s = auction_id.to_string();
    let mut params = params_vec(cfg);
    params.push(("auction_id", &auction_id_s));
    match session.fetch(&cfg.url_template, &params, &[]) {
        Some(resp) => resp
            .json::<Value>()
            .map(|v| normalize_list(&v))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "sections: bad json");
                Vec::new()
            }),
        None => Vec::new(),
    }
}

pub fn fetch_pigeons(
    session: &CrawlerSession,
    cfg: &EndpointConfig,
    auction_id: i64,
    section_id: i64,
) -> Vec<Value> {
    let auction_id_s = auction_id.to_string();
    let section_id_s = section_id.to_string();
    let mut params = params_vec(cfg);
    params.push(("auction_id", &auction_id_s));
    params.push(("section_id", &section_id_s));
    match session.fetch(&cfg.url_template, &params, &[]) {
        Some(resp) => resp
            .json::<Value>()
            .map(|v| normalize_list(&v))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "pigeons: bad json");
                Vec::new()
            }),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct CurrentLotInfo {
    pub id: i64,
    pub footring: Option<String>,
    pub matchername: Option<String>,
}

pub fn fetch_current_lot(session: &CrawlerSession, cfg: &EndpointConfig) -> Option<CurrentLotInfo> {
    let params = params_vec(cfg);
    let resp = session.fetch(&cfg.url_template, &params, &[])?;
    let body: Value = resp.json().ok()?;
    let id = body.get("id")?.as_i64()?;
    Some(CurrentLotInfo {
        id,
        footring: body
            .get("footring")
            .and_then(Value::as_str)
            .map(str::to_string),
        matchername: body
            .get("matchername")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

pub fn get_bids_for_pigeon(session: &CrawlerSession, cfg: &EndpointConfig, pid: i64) -> Vec<Value> {
    let pid_s = pid.to_string();
    let url = cfg.url_template.replace("{pid}", &pid_s);
    let params = params_vec(cfg);
    match session.fetch(&url, &params, &[]) {
        Some(resp) => resp
            .json::<Value>()
            .map(|v| normalize_list(&v))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ledger: bad json");
                Vec::new()
            }),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bare_array() {
        assert_eq!(normalize_list(&json!([1, 2])).len(), 2);
    }

    #[test]
    fn normalizes_data_field() {
        assert_eq!(normalize_list(&json!({"data": [1,2,3]})).len(), 3);
    }

    #[test]
    fn normalizes_records_field() {
        assert_eq!(normalize_list(&json!({"records": [1]})).len(), 1);
    }

    #[test]
    fn normalizes_nested_data_dict() {
        let v = json!({"data": {"foo": [], "bar": [1,2]}});
        assert_eq!(normalize_list(&v).len(), 2);
    }

    #[test]
    fn unrecognized_shape_is_empty() {
        assert_eq!(normalize_list(&json!({"nope": 1})).len(), 0);
    }
}
</content>
