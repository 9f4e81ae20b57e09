pub mod aggregate;
pub mod leaderboard;

pub use aggregate::{aggregate, TeamStat};
pub use leaderboard::{standings, summary, Leaderboard, Standings, StandingsRow, StatsSummary};
