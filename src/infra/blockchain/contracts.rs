//! Typed bindings for the Worboo contracts.
//!
//! Only the fragments the relayer touches are declared: the registry's
//! `GameRecorded` event and the token's `mintTo` function.

use ethers::contract::abigen;

abigen!(
    WorbooRegistry,
    r#"[
        event GameRecorded(address indexed player, uint64 indexed dayId, bytes32 wordHash, uint8 guesses, bool victory, uint64 streak, uint64 totalGames, uint64 totalWins)
    ]"#
);

abigen!(
    WorbooToken,
    r#"[
        function mintTo(address to, uint256 amount)
    ]"#
);

impl From<GameRecordedFilter> for crate::domain::GameRecorded {
    fn from(event: GameRecordedFilter) -> Self {
        Self {
            player: event.player,
            day_id: event.day_id,
            word_hash: event.word_hash.into(),
            guesses: event.guesses,
            victory: event.victory,
            streak: event.streak,
            total_games: event.total_games,
            total_wins: event.total_wins,
        }
    }
}
