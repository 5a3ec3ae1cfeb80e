#![allow(dead_code)]

use minddigit::room::types::{JoinRequest, JoinResult};

use super::setup::TestSetup;

/// Two players sharing a room
#[derive(Debug, Clone)]
pub struct Pair {
    pub room_id: String,
    pub host: String,
    pub guest: String,
}

impl Pair {
    pub fn opponent_of(&self, player_id: &str) -> &str {
        if player_id == self.host {
            &self.guest
        } else {
            &self.host
        }
    }
}

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    pub async fn join(&self, name: &str) -> JoinResult {
        self.service
            .join(JoinRequest {
                player_name: name.to_string(),
                player_id: None,
            })
            .await
            .unwrap()
    }

    /// Joins Alice then Bob into the same room
    pub async fn pair(&self) -> Pair {
        let host = self.join("Alice").await;
        let guest = self.join("Bob").await;
        assert_eq!(host.room_id, guest.room_id);
        Pair {
            room_id: host.room_id,
            host: host.player_id,
            guest: guest.player_id,
        }
    }

    /// Both players pick `digits` and set their secrets
    pub async fn start_game(&self, digits: usize, host_secret: &str, guest_secret: &str) -> Pair {
        let pair = self.pair().await;
        for player in [&pair.host, &pair.guest] {
            self.service
                .select_digit_count(&pair.room_id, player, digits)
                .await
                .unwrap();
        }
        self.service
            .set_secret(&pair.room_id, &pair.host, host_secret)
            .await
            .unwrap();
        self.service
            .set_secret(&pair.room_id, &pair.guest, guest_secret)
            .await
            .unwrap();
        pair
    }
}
