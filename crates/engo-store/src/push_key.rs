//! Time-ordered child keys.
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, all drawn from an alphabet whose ASCII order matches its
//! numeric order. Keys issued later by the same generator always sort after
//! earlier ones, including within one millisecond.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub const PUSH_KEY_LEN: usize = 20;
const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = PUSH_KEY_LEN - TIME_LEN;

#[derive(Debug, Default)]
struct State {
    last_millis: i64,
    last_random: [u8; RANDOM_LEN],
}

#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    state: Mutex<State>,
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self) -> String {
        self.next_key_at(Utc::now().timestamp_millis())
    }

    /// Issue a key for `millis`. A clock that steps backwards is clamped to
    /// the last issued time so ordering still holds.
    pub fn next_key_at(&self, millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if millis > state.last_millis {
            state.last_millis = millis;
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        } else {
            increment(&mut state.last_random);
        }

        let mut key = [0u8; PUSH_KEY_LEN];
        let mut ts = state.last_millis.max(0) as u64;
        for i in (0..TIME_LEN).rev() {
            key[i] = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        for (i, &r) in state.last_random.iter().enumerate() {
            key[TIME_LEN + i] = PUSH_CHARS[r as usize];
        }

        key.iter().map(|&b| b as char).collect()
    }
}

fn increment(random: &mut [u8; RANDOM_LEN]) {
    for slot in random.iter_mut().rev() {
        if *slot == 63 {
            *slot = 0;
        } else {
            *slot += 1;
            return;
        }
    }
}
