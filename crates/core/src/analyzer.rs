//! PII recognizers: e-mail, phone, credit card and person names.
//!
//! Offsets are byte offsets into the analysed text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Person,
    EmailAddress,
    PhoneNumber,
    CreditCard,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::PhoneNumber,
        EntityKind::EmailAddress,
        EntityKind::Person,
        EntityKind::CreditCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "PERSON",
            EntityKind::EmailAddress => "EMAIL_ADDRESS",
            EntityKind::PhoneNumber => "PHONE_NUMBER",
            EntityKind::CreditCard => "CREDIT_CARD",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PiiMatch {
    pub kind: EntityKind,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl PiiMatch {
    fn overlaps(&self, other: &PiiMatch) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static CARD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d(?:[ -]?\d){12,18}").unwrap());
static PHONE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // +1 (555) 123-4567, 555.123.4567, 5551234567
        r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}",
        // +91 98765 43210, 9876543210
        r"(?:\+91[\s-]?)?[6-9]\d{4}[\s-]?\d{5}",
        // 555-0123
        r"\d{3}-\d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static CAPITALIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z]+(?:['-][A-Z]?[a-z]+)?").unwrap());
static CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:my name is|i am|i'm|call me|contact|this is)\s+)([A-Z][a-z]+(?:\s[A-Z][a-z]+){0,2})",
    )
    .unwrap()
});

pub(crate) const FIRST_NAMES_US: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Joseph", "Thomas",
    "Charles", "Christopher", "Daniel", "Matthew", "Anthony", "Mark", "Steven", "Paul", "Andrew",
    "Joshua", "Kevin", "Brian", "George", "Edward", "Ronald", "Timothy", "Jason", "Jeffrey",
    "Ryan", "Jacob", "Gary", "Eric", "Jonathan", "Stephen", "Larry", "Justin", "Scott", "Frank",
    "Brandon", "Benjamin", "Samuel", "Peter", "Alexander", "Patrick", "Jack", "Bob", "Tom",
    "Mary", "Patricia", "Jennifer", "Linda", "Elizabeth", "Barbara", "Susan", "Jessica", "Sarah",
    "Karen", "Nancy", "Lisa", "Betty", "Margaret", "Sandra", "Ashley", "Kimberly", "Emily",
    "Donna", "Michelle", "Carol", "Amanda", "Melissa", "Deborah", "Stephanie", "Rebecca",
    "Laura", "Sharon", "Cynthia", "Kathleen", "Amy", "Angela", "Anna", "Emma", "Olivia",
    "Sophia", "Alice", "Julia", "Grace", "Chloe", "Hannah", "Rachel", "Kate", "Jane",
];

pub(crate) const FIRST_NAMES_IN: &[&str] = &[
    "Aarav", "Aditya", "Ajay", "Akash", "Amit", "Amitabh", "Anil", "Arjun", "Arun", "Ashok",
    "Deepak", "Dev", "Gaurav", "Harsh", "Karan", "Kiran", "Krishna", "Manish", "Mohan", "Nikhil",
    "Nitin", "Pranav", "Rahul", "Raj", "Rajesh", "Rakesh", "Ramesh", "Ravi", "Rohan", "Rohit",
    "Sachin", "Sanjay", "Sandeep", "Shah", "Shiv", "Sunil", "Suresh", "Tarun", "Varun", "Vijay",
    "Vikram", "Vinod", "Virat", "Vivek", "Yash", "Aishwarya", "Ananya", "Anjali", "Anita",
    "Deepika", "Divya", "Gita", "Isha", "Kavya", "Lakshmi", "Meena", "Meera", "Neha", "Nisha",
    "Pooja", "Priya", "Priyanka", "Radha", "Rekha", "Riya", "Sangeeta", "Saanvi", "Shreya",
    "Sita", "Sneha", "Sonia", "Sunita", "Swati", "Tanvi", "Usha", "Vidya",
];

pub(crate) const LAST_NAMES_US: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Wilson", "Anderson",
    "Taylor", "Thomas", "Moore", "Martin", "Jackson", "Thompson", "White", "Harris", "Clark",
    "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright", "Scott", "Hill", "Green",
];

pub(crate) const LAST_NAMES_IN: &[&str] = &[
    "Sharma", "Verma", "Gupta", "Patel", "Singh", "Kumar", "Reddy", "Rao", "Iyer", "Nair",
    "Menon", "Joshi", "Mehta", "Shah", "Desai", "Kapoor", "Malhotra", "Chopra", "Bose",
    "Banerjee", "Mukherjee", "Chatterjee", "Das", "Pillai", "Agarwal", "Bhat", "Kulkarni",
];

/// Capitalised words that never start or extend a name.
const NOT_NAMES: &[&str] = &[
    "I", "The", "A", "An", "And", "Or", "But", "Is", "Are", "Was", "At", "In", "On", "To", "For",
    "Of", "My", "Your", "His", "Her", "Our", "Their", "This", "That", "What", "Who", "How", "Why",
    "When", "Where", "Hello", "Hi", "Dear", "Thanks", "Please", "Contact", "Call", "Email",
    "Phone", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "Happy", "Sorry", "Sure", "Fine", "Good", "Not", "Here",
    "Going", "Ready", "Done", "Echoing",
];

static GIVEN_NAMES: Lazy<HashSet<String>> = Lazy::new(|| {
    FIRST_NAMES_US
        .iter()
        .chain(FIRST_NAMES_IN.iter())
        .map(|n| n.to_lowercase())
        .collect()
});
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| NOT_NAMES.iter().copied().collect());

#[derive(Debug, Default, Clone)]
pub struct PiiAnalyzer;

impl PiiAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str, kinds: &[EntityKind]) -> Vec<PiiMatch> {
        let mut candidates = Vec::new();
        for kind in kinds {
            match kind {
                EntityKind::EmailAddress => emails(text, &mut candidates),
                EntityKind::PhoneNumber => phones(text, &mut candidates),
                EntityKind::CreditCard => cards(text, &mut candidates),
                EntityKind::Person => persons(text, &mut candidates),
            }
        }
        resolve_overlaps(candidates)
    }

    /// Replaces every detected span with its `<KIND>` tag.
    pub fn mask(&self, text: &str, kinds: &[EntityKind]) -> String {
        let mut out = text.to_string();
        for m in self.analyze(text, kinds).iter().rev() {
            out.replace_range(m.start..m.end, &format!("<{}>", m.kind));
        }
        out
    }
}

fn resolve_overlaps(mut candidates: Vec<PiiMatch>) -> Vec<PiiMatch> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.len().cmp(&a.len()))
            .then(a.start.cmp(&b.start))
    });
    let mut kept: Vec<PiiMatch> = Vec::new();
    for c in candidates {
        if !kept.iter().any(|k| k.overlaps(&c)) {
            kept.push(c);
        }
    }
    kept.sort_by_key(|m| m.start);
    kept
}

/// Rejects matches glued to surrounding letters or digits.
fn isolated(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map_or(false, |c| c.is_ascii_alphanumeric())
        && !after.map_or(false, |c| c.is_ascii_alphanumeric())
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn emails(text: &str, out: &mut Vec<PiiMatch>) {
    for m in EMAIL_RE.find_iter(text) {
        // trailing dots belong to the sentence, not the address
        let trimmed = m.as_str().trim_end_matches('.');
        out.push(PiiMatch {
            kind: EntityKind::EmailAddress,
            start: m.start(),
            end: m.start() + trimmed.len(),
            score: 1.0,
        });
    }
}

fn phones(text: &str, out: &mut Vec<PiiMatch>) {
    for re in PHONE_RES.iter() {
        for m in re.find_iter(text) {
            if isolated(text, m.start(), m.end()) && digit_count(m.as_str()) >= 7 {
                out.push(PiiMatch {
                    kind: EntityKind::PhoneNumber,
                    start: m.start(),
                    end: m.end(),
                    score: 0.75,
                });
            }
        }
    }
}

pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    let mut double = false;
    for c in digits.chars().rev() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

fn cards(text: &str, out: &mut Vec<PiiMatch>) {
    for m in CARD_RE.find_iter(text) {
        let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        if (13..=19).contains(&digits.len())
            && isolated(text, m.start(), m.end())
            && luhn_valid(&digits)
        {
            out.push(PiiMatch {
                kind: EntityKind::CreditCard,
                start: m.start(),
                end: m.end(),
                score: 1.0,
            });
        }
    }
}

fn persons(text: &str, out: &mut Vec<PiiMatch>) {
    // gazetteer: a known given name plus up to two capitalised surnames
    let words: Vec<_> = CAPITALIZED_RE
        .find_iter(text)
        .filter(|m| isolated(text, m.start(), m.end()))
        .collect();
    let mut i = 0;
    while i < words.len() {
        let w = words[i];
        if !GIVEN_NAMES.contains(&w.as_str().to_lowercase()) || STOP_WORDS.contains(w.as_str()) {
            i += 1;
            continue;
        }
        let start = w.start();
        let mut end = w.end();
        let mut j = i + 1;
        while j < words.len() && j <= i + 2 {
            let next = words[j];
            if &text[end..next.start()] != " " || STOP_WORDS.contains(next.as_str()) {
                break;
            }
            end = next.end();
            j += 1;
        }
        out.push(PiiMatch {
            kind: EntityKind::Person,
            start,
            end,
            score: 0.85,
        });
        i = j;
    }

    // cue phrases: "my name is X Y"
    for caps in CUE_RE.captures_iter(text) {
        let Some(name) = caps.get(1) else { continue };
        let mut end = name.start();
        for part in CAPITALIZED_RE.find_iter(name.as_str()) {
            if STOP_WORDS.contains(part.as_str()) {
                break;
            }
            end = name.start() + part.end();
        }
        if end > name.start() {
            out.push(PiiMatch {
                kind: EntityKind::Person,
                start: name.start(),
                end,
                score: 0.6,
            });
        }
    }
}
