//! Realistic surrogates for detected PII.

use crate::analyzer::{
    luhn_valid, EntityKind, FIRST_NAMES_IN, FIRST_NAMES_US, LAST_NAMES_IN, LAST_NAMES_US,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.example"];

pub struct FakeGenerator {
    rng: Mutex<StdRng>,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl FakeGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self, kind: EntityKind) -> String {
        let mut guard = match self.rng.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let rng = &mut *guard;
        match kind {
            EntityKind::Person => name(rng),
            EntityKind::EmailAddress => email(rng),
            EntityKind::PhoneNumber => phone(rng),
            EntityKind::CreditCard => card(rng),
        }
    }
}

/// Opaque tag used when no realistic surrogate is available.
pub fn tagged(kind: EntityKind) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("<{}_{}>", kind, &id[..8])
}

fn name(rng: &mut StdRng) -> String {
    // en_IN and en_US pools, as in the detector's gazetteer
    let (first, last) = if rng.gen_bool(0.5) {
        (FIRST_NAMES_IN, LAST_NAMES_IN)
    } else {
        (FIRST_NAMES_US, LAST_NAMES_US)
    };
    format!(
        "{} {}",
        first.choose(rng).copied().unwrap_or("Alex"),
        last.choose(rng).copied().unwrap_or("Doe")
    )
}

fn email(rng: &mut StdRng) -> String {
    let first = FIRST_NAMES_US
        .iter()
        .chain(FIRST_NAMES_IN.iter())
        .nth(rng.gen_range(0..FIRST_NAMES_US.len() + FIRST_NAMES_IN.len()))
        .copied()
        .unwrap_or("user");
    let last = LAST_NAMES_US.choose(rng).copied().unwrap_or("doe");
    let domain = EMAIL_DOMAINS.choose(rng).copied().unwrap_or("example.com");
    format!(
        "{}.{}{}@{}",
        first.to_lowercase(),
        last.to_lowercase(),
        rng.gen_range(10..100),
        domain
    )
}

fn phone(rng: &mut StdRng) -> String {
    if rng.gen_bool(0.5) {
        format!(
            "+91 {}{:04} {:05}",
            rng.gen_range(6..10),
            rng.gen_range(0..10_000),
            rng.gen_range(0..100_000)
        )
    } else {
        format!(
            "({:03}) 555-{:04}",
            rng.gen_range(201..990),
            rng.gen_range(100..200)
        )
    }
}

fn card(rng: &mut StdRng) -> String {
    let mut digits: Vec<u32> = vec![4];
    digits.extend((0..14).map(|_| rng.gen_range(0..10)));
    let body: String = digits.iter().map(|d| char::from(b'0' + *d as u8)).collect();
    let check = (0..10)
        .find(|c| luhn_valid(&format!("{}{}", body, c)))
        .unwrap_or(0);
    format!("{}{}", body, check)
}
