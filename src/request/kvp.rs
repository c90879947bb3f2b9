//! Key/value-pair query string reader

/// Parsed `key=value&...` query with case-insensitive, repeatable keys
#[derive(Debug, Clone, Default)]
pub struct KvpReader {
    pairs: Vec<(String, String)>,
}

impl KvpReader {
    /// Parse a query string; a leading `http://host/path?` prefix is ignored
    pub fn parse(query: &str) -> Result<Self, String> {
        let query = match query.find('?') {
            Some(idx) => &query[idx + 1..],
            None => query,
        };
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.trim())
            .map_err(|e| format!("Malformed query string: {}", e))?;
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Ok(KvpReader { pairs })
    }

    /// First non-empty value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// All values for a repeatable key, in request order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
