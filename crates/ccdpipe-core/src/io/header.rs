use std::fmt;

use crate::consts::FITS_CARD_SIZE;

/// Keywords that describe the data layout. They are regenerated on write and
/// never kept in a [`Header`].
pub const STRUCTURAL_KEYWORDS: [&str; 13] = [
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "BZERO",
    "BSCALE", "PCOUNT", "GCOUNT", "END",
];

const COMMENTARY_KEYWORDS: [&str; 3] = ["COMMENT", "HISTORY", ""];

/// Typed value of a header card.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view. Text values holding a plain number are accepted, since
    /// some acquisition software writes numbers as quoted strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Logical(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            _ => None,
        }
    }

    /// Value as written in the value field of a card.
    fn to_field(&self) -> String {
        match self {
            Self::Logical(true) => format!("{:>20}", "T"),
            Self::Logical(false) => format!("{:>20}", "F"),
            Self::Integer(i) => format!("{:>20}", i),
            Self::Float(f) => format!("{:>20}", format_float(*f)),
            Self::Text(s) => {
                let quoted = format!("'{:<8}'", s.replace('\'', "''"));
                format!("{:<20}", quoted)
            }
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logical(true) => write!(f, "T"),
            Self::Logical(false) => write!(f, "F"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        Self::Logical(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<usize> for HeaderValue {
    fn from(v: usize) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One 80-character header record.
///
/// Commentary cards (`COMMENT`, `HISTORY`, blank keyword) have no value; their
/// free text is kept in `comment`.
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<HeaderValue>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: impl Into<HeaderValue>) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value: Some(value.into()),
            comment: None,
        }
    }

    pub fn commentary(keyword: &str, text: &str) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value: None,
            comment: Some(text.to_string()),
        }
    }

    pub fn is_commentary(&self) -> bool {
        self.value.is_none()
    }

    /// Parse one record. Returns `None` for blank padding records.
    pub(crate) fn parse(record: &str) -> Option<Self> {
        let text = record;
        let keyword_field = text.get(..8).unwrap_or(text).trim_end();

        if keyword_field == "HIERARCH" {
            let rest = text.get(8..).unwrap_or("");
            if let Some(eq) = rest.find('=') {
                let (value, comment) = parse_value_field(&rest[eq + 1..]);
                return Some(Self {
                    keyword: rest[..eq].trim().to_string(),
                    value: Some(value),
                    comment,
                });
            }
        }

        let body = text.get(8..).unwrap_or("");
        let is_value_card = !COMMENTARY_KEYWORDS.contains(&keyword_field)
            && keyword_field != CONTINUE_KEYWORD
            && body.starts_with("= ");

        if is_value_card {
            let (value, comment) = parse_value_field(&body[2..]);
            Some(Self {
                keyword: keyword_field.to_string(),
                value: Some(value),
                comment,
            })
        } else {
            let body = body.trim_end();
            if keyword_field.is_empty() && body.trim().is_empty() {
                return None;
            }
            Some(Self {
                keyword: keyword_field.to_string(),
                value: None,
                comment: Some(body.to_string()),
            })
        }
    }

    /// Render as 80-character ASCII records. Text values that do not fit in
    /// one record are split over `CONTINUE` records.
    pub(crate) fn to_records(&self) -> Vec<String> {
        let value = match &self.value {
            None => {
                let line = format!(
                    "{:<8}{}",
                    self.keyword,
                    self.comment.as_deref().unwrap_or("")
                );
                return vec![fit_record(&line)];
            }
            Some(value) => value,
        };

        let head = if self.keyword.len() > 8 || self.keyword.contains(' ') {
            format!("HIERARCH {} = ", self.keyword)
        } else {
            format!("{:<8}= ", self.keyword)
        };

        let mut lines = match value {
            HeaderValue::Text(s) if head.len() + quoted_len(s) > FITS_CARD_SIZE => {
                long_string_lines(&head, s)
            }
            HeaderValue::Text(_) => vec![format!("{}{}", head, value.to_field())],
            _ if head.len() > 10 => vec![format!("{}{}", head, value.to_field().trim_start())],
            _ => vec![format!("{}{}", head, value.to_field())],
        };

        if let (Some(c), Some(last)) = (self.comment.as_deref(), lines.last_mut()) {
            if !c.is_empty() {
                last.push_str(" / ");
                last.push_str(c);
            }
        }
        lines.iter().map(|l| fit_record(l)).collect()
    }
}

const CONTINUE_KEYWORD: &str = "CONTINUE";

/// Whether a card holds a text value marked as continued on the next record.
fn continues(card: &Card) -> bool {
    matches!(&card.value, Some(HeaderValue::Text(t)) if t.ends_with('&'))
}

/// Length of a text value once quoted and escaped.
fn quoted_len(s: &str) -> usize {
    s.chars().count() + s.matches('\'').count() + 2
}

/// Split an escaped string over a first record and `CONTINUE` records, each
/// chunk but the last ending in `&`. Escaped quote pairs are never split.
fn long_string_lines(head: &str, s: &str) -> Vec<String> {
    let mut tokens: Vec<&str> = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '\'' {
            tokens.push(&s[start..i]);
            tokens.push("''");
            start = i + c.len_utf8();
        }
    }
    tokens.push(&s[start..]);

    let first_room = FITS_CARD_SIZE.saturating_sub(head.len() + 3).max(1);
    let continue_room = FITS_CARD_SIZE - 10 - 3;
    let mut chunks: Vec<String> = vec![String::new()];
    for token in tokens {
        let pieces: Vec<String> = if token == "''" {
            vec![token.to_string()]
        } else {
            token.chars().map(String::from).collect()
        };
        for piece in pieces {
            let room = if chunks.len() == 1 { first_room } else { continue_room };
            let current = chunks.last().map(|c| c.chars().count()).unwrap_or(0);
            if current + piece.len() > room {
                chunks.push(String::new());
            }
            if let Some(chunk) = chunks.last_mut() {
                chunk.push_str(&piece);
            }
        }
    }

    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let amp = if i == last { "" } else { "&" };
            if i == 0 {
                format!("{}'{}{}'", head, chunk, amp)
            } else {
                format!("{:<10}'{}{}'", CONTINUE_KEYWORD, chunk, amp)
            }
        })
        .collect()
}

/// Pad or cut a line to one record, replacing anything outside printable ASCII.
fn fit_record(line: &str) -> String {
    let mut record: String = line
        .chars()
        .take(FITS_CARD_SIZE)
        .map(|ch| {
            if ch.is_ascii() && !ch.is_ascii_control() {
                ch
            } else {
                '?'
            }
        })
        .collect();
    while record.len() < FITS_CARD_SIZE {
        record.push(' ');
    }
    record
}

/// Split the value field of a card (the text after `= `) into value and comment.
fn parse_value_field(field: &str) -> (HeaderValue, Option<String>) {
    let field = field.trim_start();

    if let Some(quoted) = field.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = quoted.char_indices().peekable();
        let mut rest_start = quoted.len();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                } else {
                    rest_start = i + 1;
                    break;
                }
            } else {
                value.push(c);
            }
        }
        let comment = quoted[rest_start..]
            .split_once('/')
            .map(|(_, c)| c.trim().to_string())
            .filter(|c| !c.is_empty());
        return (HeaderValue::Text(value.trim_end().to_string()), comment);
    }

    let (raw, comment) = match field.split_once('/') {
        Some((v, c)) => (v.trim(), Some(c.trim().to_string()).filter(|c| !c.is_empty())),
        None => (field.trim(), None),
    };

    let value = match raw {
        "T" => HeaderValue::Logical(true),
        "F" => HeaderValue::Logical(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                HeaderValue::Integer(i)
            } else if let Ok(f) = raw.replace(['D', 'd'], "E").parse::<f64>() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::Text(raw.to_string())
            }
        }
    };
    (value, comment)
}

/// Float formatting that always reads back as a float.
fn format_float(v: f64) -> String {
    format!("{:?}", v).to_ascii_uppercase()
}

/// Ordered set of header cards of one HDU, without the structural keywords.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header from raw records, joining `CONTINUE` records onto the
    /// text value they extend.
    pub(crate) fn from_records<'a>(records: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cards: Vec<Card> = Vec::new();
        for record in records {
            let Some(card) = Card::parse(record) else {
                continue;
            };
            if card.keyword == CONTINUE_KEYWORD {
                if let Some(prev) = cards.last_mut().filter(|c| continues(c)) {
                    let (next, comment) = parse_value_field(card.comment.as_deref().unwrap_or(""));
                    if let (Some(HeaderValue::Text(text)), HeaderValue::Text(more)) =
                        (prev.value.as_mut(), next)
                    {
                        text.pop();
                        text.push_str(&more);
                        if comment.is_some() {
                            prev.comment = comment;
                        }
                        continue;
                    }
                }
            }
            cards.push(card);
        }
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.cards
            .iter()
            .position(|c| !c.is_commentary() && c.keyword.eq_ignore_ascii_case(key))
    }

    /// First value card with this keyword.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.position(key)
            .and_then(|i| self.cards[i].value.as_ref())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Replace the value of an existing card (keeping its comment) or append a new one.
    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) {
        match self.position(key) {
            Some(i) => self.cards[i].value = Some(value.into()),
            None => self.cards.push(Card::new(key, value)),
        }
    }

    pub fn set_with_comment(&mut self, key: &str, value: impl Into<HeaderValue>, comment: &str) {
        let mut card = Card::new(key, value);
        card.comment = Some(comment.to_string());
        match self.position(key) {
            Some(i) => self.cards[i] = card,
            None => self.cards.push(card),
        }
    }

    /// Remove every value card with this keyword. Returns whether any was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.cards.len();
        self.cards
            .retain(|c| c.is_commentary() || !c.keyword.eq_ignore_ascii_case(key));
        self.cards.len() != before
    }

    /// Free text of every commentary card with this keyword, in order.
    pub fn commentary<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.cards
            .iter()
            .filter(move |c| c.is_commentary() && c.keyword.eq_ignore_ascii_case(keyword))
            .filter_map(|c| c.comment.as_deref())
    }

    pub fn add_commentary(&mut self, keyword: &str, text: &str) {
        self.cards.push(Card::commentary(keyword, text));
    }

    /// Overlay another header: its value cards replace or extend ours, its
    /// commentary cards are appended.
    pub fn merge(&mut self, other: &Header) {
        for card in &other.cards {
            match (&card.value, self.position(&card.keyword)) {
                (Some(_), Some(i)) => self.cards[i] = card.clone(),
                _ => self.cards.push(card.clone()),
            }
        }
    }

    /// Drop the data-layout keywords.
    pub(crate) fn strip_structural(&mut self) {
        self.cards.retain(|c| {
            c.is_commentary() || !STRUCTURAL_KEYWORDS.contains(&c.keyword.as_str())
        });
    }
}
