//! Well-known text (WKT1) coordinate system reader
//!
//! Only the subset of WKT emitted by GDAL for GEOGCS/PROJCS definitions is
//! understood. The parsed tree can be turned into a PROJ.4 string for
//! proj4rs and into the GCTP projection code used by HDF-EOS grids.

use super::crs::CrsError;

/// A value inside a WKT node
#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Text(String),
    Number(f64),
    /// Bare enumerations such as the `EAST` in `AXIS["X",EAST]`
    Keyword(String),
    Node(WktNode),
}

/// A `KEYWORD[...]` node of a WKT tree
#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub values: Vec<WktValue>,
}

impl WktNode {
    /// Parse a complete WKT definition
    pub fn parse(text: &str) -> Result<WktNode, CrsError> {
        let mut parser = WktParser { input: text.as_bytes(), pos: 0 };
        let node = parser.parse_node()?;
        parser.skip_whitespace();
        if parser.pos != parser.input.len() {
            return Err(CrsError::MalformedWkt(format!(
                "Unexpected trailing content at offset {}",
                parser.pos
            )));
        }
        Ok(node)
    }

    /// The first quoted value, which WKT uses as the object name
    pub fn name(&self) -> Option<&str> {
        self.values.iter().find_map(|v| match v {
            WktValue::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Direct child node with the given keyword
    pub fn child(&self, keyword: &str) -> Option<&WktNode> {
        self.children(keyword).next()
    }

    pub fn children<'a, 'k>(&'a self, keyword: &'k str) -> impl Iterator<Item = &'a WktNode> + 'k
    where
        'a: 'k,
    {
        self.values.iter().filter_map(move |v| match v {
            WktValue::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    /// The n-th numeric value of this node
    pub fn number(&self, index: usize) -> Option<f64> {
        self.values
            .iter()
            .filter_map(|v| match v {
                WktValue::Number(n) => Some(*n),
                _ => None,
            })
            .nth(index)
    }

    /// The node's own `AUTHORITY["EPSG","n"]`, if present
    pub fn epsg_code(&self) -> Option<u32> {
        let authority = self.child("AUTHORITY")?;
        let mut texts = authority.values.iter().filter_map(|v| match v {
            WktValue::Text(s) => Some(s.as_str()),
            _ => None,
        });
        let name = texts.next()?;
        let code = texts.next()?;
        if name.eq_ignore_ascii_case("EPSG") {
            code.trim().parse().ok()
        } else {
            None
        }
    }

    /// The `AUTHORITY` of this node rendered as `NAME:code`
    pub fn authority(&self) -> Option<String> {
        let authority = self.child("AUTHORITY")?;
        let texts: Vec<&str> = authority
            .values
            .iter()
            .filter_map(|v| match v {
                WktValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        match texts.as_slice() {
            [name, code, ..] => Some(format!("{}:{}", name, code)),
            _ => None,
        }
    }

    /// Value of a `PARAMETER["name",value]` child, matched case-insensitively
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.children("PARAMETER")
            .find(|p| p.name().map_or(false, |n| n.eq_ignore_ascii_case(name)))
            .and_then(|p| p.number(0))
    }

    pub fn is_geographic(&self) -> bool {
        self.keyword.eq_ignore_ascii_case("GEOGCS")
    }

    pub fn is_local(&self) -> bool {
        self.keyword.eq_ignore_ascii_case("LOCAL_CS")
    }

    pub fn projection_name(&self) -> Option<&str> {
        self.child("PROJECTION").and_then(|p| p.name())
    }

    /// PROJ.4 projection name for the node's PROJECTION
    fn proj_name(&self) -> Result<&'static str, CrsError> {
        let projection = self
            .projection_name()
            .ok_or_else(|| CrsError::MalformedWkt("PROJCS without PROJECTION".to_string()))?;
        let normalized = projection.to_ascii_lowercase().replace(' ', "_");
        let name = match normalized.as_str() {
            "sinusoidal" => "sinu",
            "cylindrical_equal_area" | "lambert_cylindrical_equal_area" => "cea",
            "transverse_mercator" => "tmerc",
            "mercator_1sp" | "mercator_2sp" | "mercator" => "merc",
            "lambert_azimuthal_equal_area" => "laea",
            "polar_stereographic" | "stereographic_north_pole" | "stereographic_south_pole" => "stere",
            "albers_conic_equal_area" => "aea",
            "lambert_conformal_conic_1sp" | "lambert_conformal_conic_2sp" => "lcc",
            "equirectangular" | "plate_carree" => "eqc",
            "polyconic" => "poly",
            _ => return Err(CrsError::Unsupported(format!("projection {}", projection))),
        };
        Ok(name)
    }

    /// GCTP projection code (0 = geographic, 16 = sinusoidal, 97 = cylindrical equal area, ...)
    pub fn gctp_code(&self) -> Option<u32> {
        if self.is_geographic() {
            return Some(0);
        }
        if !self.keyword.eq_ignore_ascii_case("PROJCS") {
            return None;
        }
        let proj = self.proj_name().ok()?;
        let is_utm = self.name().map_or(false, |n| n.contains("UTM"));
        if proj == "tmerc" && is_utm {
            return Some(1);
        }
        gctp_from_proj_name(proj)
    }

    /// Convert the definition into a PROJ.4 string
    pub fn to_proj4(&self) -> Result<String, CrsError> {
        if self.is_geographic() {
            return Ok(format!("+proj=longlat {} +no_defs", ellipsoid_terms(self)?));
        }
        if !self.keyword.eq_ignore_ascii_case("PROJCS") {
            return Err(CrsError::Unsupported(format!("{} definitions", self.keyword)));
        }

        let proj = self.proj_name()?;
        let mut terms = vec![format!("+proj={}", proj)];

        let parallel_key = match proj {
            "cea" | "merc" | "eqc" | "stere" => "lat_ts",
            _ => "lat_1",
        };
        let keys: [(&str, &str); 7] = [
            ("latitude_of_origin", "lat_0"),
            ("central_meridian", "lon_0"),
            ("standard_parallel_1", parallel_key),
            ("standard_parallel_2", "lat_2"),
            ("scale_factor", "k_0"),
            ("false_easting", "x_0"),
            ("false_northing", "y_0"),
        ];
        for (wkt_name, proj_key) in keys {
            if let Some(value) = self.parameter(wkt_name) {
                terms.push(format!("+{}={}", proj_key, value));
            }
        }

        match (self.parameter("semi_major"), self.parameter("semi_minor")) {
            (Some(a), Some(b)) => terms.push(format!("+a={} +b={}", a, b)),
            _ => {
                let geogcs = self
                    .child("GEOGCS")
                    .ok_or_else(|| CrsError::MalformedWkt("PROJCS without GEOGCS".to_string()))?;
                terms.push(ellipsoid_terms(geogcs)?);
            }
        }

        terms.push("+units=m +no_defs".to_string());
        Ok(terms.join(" "))
    }
}

/// GCTP code for a PROJ.4 projection name
pub fn gctp_from_proj_name(proj: &str) -> Option<u32> {
    match proj {
        "longlat" | "latlong" => Some(0),
        "utm" => Some(1),
        "aea" => Some(3),
        "lcc" => Some(4),
        "merc" => Some(5),
        "stere" => Some(6),
        "poly" => Some(7),
        "tmerc" => Some(9),
        "laea" => Some(11),
        "sinu" => Some(16),
        "eqc" => Some(17),
        "cea" => Some(97),
        _ => None,
    }
}

fn ellipsoid_terms(geogcs: &WktNode) -> Result<String, CrsError> {
    let datum = geogcs
        .child("DATUM")
        .ok_or_else(|| CrsError::MalformedWkt("GEOGCS without DATUM".to_string()))?;
    if datum.name().map_or(false, |n| n.eq_ignore_ascii_case("WGS_1984")) {
        return Ok("+datum=WGS84".to_string());
    }

    let spheroid = datum
        .child("SPHEROID")
        .ok_or_else(|| CrsError::MalformedWkt("DATUM without SPHEROID".to_string()))?;
    let semi_major = spheroid
        .number(0)
        .ok_or_else(|| CrsError::MalformedWkt("SPHEROID without semi-major axis".to_string()))?;
    let inverse_flattening = spheroid.number(1).unwrap_or(0.0);

    let semi_minor = if inverse_flattening == 0.0 {
        semi_major
    } else {
        semi_major * (1.0 - 1.0 / inverse_flattening)
    };
    Ok(format!("+a={} +b={}", semi_major, semi_minor))
}

struct WktParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> WktParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, what: &str) -> CrsError {
        CrsError::MalformedWkt(format!("{} at offset {}", what, self.pos))
    }

    fn parse_word(&mut self) -> Result<String, CrsError> {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("Expected keyword"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn parse_quoted(&mut self) -> Result<String, CrsError> {
        // Opening quote
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') if self.input.get(self.pos + 1) == Some(&b'"') => {
                    bytes.push(b'"');
                    self.pos += 2;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    bytes.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("Unterminated string")),
            }
        }
        String::from_utf8(bytes).map_err(|_| self.error("Invalid UTF-8 in string"))
    }

    fn parse_number(&mut self) -> Result<f64, CrsError> {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let token = String::from_utf8_lossy(&self.input[start..self.pos]);
        token.parse::<f64>().map_err(|_| self.error("Invalid number"))
    }

    fn parse_node(&mut self) -> Result<WktNode, CrsError> {
        self.skip_whitespace();
        let keyword = self.parse_word()?.to_ascii_uppercase();
        self.skip_whitespace();

        match self.peek() {
            Some(b'[') | Some(b'(') => self.pos += 1,
            _ => return Err(self.error("Expected '['")),
        }

        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') | Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => self.pos += 1,
                Some(b'"') => values.push(WktValue::Text(self.parse_quoted()?)),
                Some(c) if c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.') => {
                    values.push(WktValue::Number(self.parse_number()?))
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    let start = self.pos;
                    let word = self.parse_word()?;
                    self.skip_whitespace();
                    if matches!(self.peek(), Some(b'[') | Some(b'(')) {
                        self.pos = start;
                        values.push(WktValue::Node(self.parse_node()?));
                    } else {
                        values.push(WktValue::Keyword(word));
                    }
                }
                Some(_) => return Err(self.error("Unexpected character")),
                None => return Err(self.error("Unterminated node")),
            }
        }

        Ok(WktNode { keyword, values })
    }
}
