//! Lobbies and running games.
//!
//! Both maps live under one `RwLock` so a lobby name and its game id are
//! always inserted together. Boards sit behind their own mutex: a move
//! clones the board handle under the registry read lock, releases it, and
//! only then calls into the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{Outcome, RuleEngine};
use crate::error::{DomainError, Result};

/// Default number of seats in a game.
pub const DEFAULT_MAX_PLAYERS: usize = 2;

struct GameSession<B> {
    id: Uuid,
    creator: String,
    lobby: String,
    players: Vec<String>,
    max_players: usize,
    locked: bool,
    board: Arc<Mutex<B>>,
}

impl<B> GameSession<B> {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            creator: self.creator.clone(),
            lobby: self.lobby.clone(),
            players: self.players.clone(),
            max_players: self.max_players,
            locked: self.locked,
        }
    }
}

/// Read-only view of a game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub creator: String,
    pub lobby: String,
    pub players: Vec<String>,
    pub max_players: usize,
    pub locked: bool,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub position: String,
    pub outcome: Outcome,
}

struct Maps<B> {
    by_id: HashMap<Uuid, GameSession<B>>,
    by_lobby: HashMap<String, Uuid>,
}

/// Lobby name and game id to game session.
pub struct GameRegistry<E: RuleEngine> {
    engine: E,
    max_players: usize,
    maps: RwLock<Maps<E::Board>>,
}

impl<E: RuleEngine> GameRegistry<E> {
    pub fn new(engine: E) -> Self {
        Self::with_max_players(engine, DEFAULT_MAX_PLAYERS)
    }

    pub fn with_max_players(engine: E, max_players: usize) -> Self {
        Self {
            engine,
            max_players: max_players.max(1),
            maps: RwLock::new(Maps {
                by_id: HashMap::new(),
                by_lobby: HashMap::new(),
            }),
        }
    }

    /// Open a new lobby with `creator` seated.
    pub fn create_game(&self, creator: &str, lobby: &str) -> Result<Uuid> {
        let board = self.engine.new_game();
        let mut maps = self.maps.write()?;
        if maps.by_lobby.contains_key(lobby) {
            return Err(DomainError::LobbyExists(lobby.to_string()).into());
        }

        let id = Uuid::new_v4();
        let session = GameSession {
            id,
            creator: creator.to_string(),
            lobby: lobby.to_string(),
            players: vec![creator.to_string()],
            max_players: self.max_players,
            locked: self.max_players <= 1,
            board: Arc::new(Mutex::new(board)),
        };
        maps.by_lobby.insert(lobby.to_string(), id);
        maps.by_id.insert(id, session);

        info!(%id, lobby, creator, "game created");
        Ok(id)
    }

    /// Seat `player` in `lobby`; the game locks once every seat is taken.
    pub fn join_game(&self, lobby: &str, player: &str) -> Result<Uuid> {
        let mut maps = self.maps.write()?;
        let id = *maps
            .by_lobby
            .get(lobby)
            .ok_or_else(|| DomainError::LobbyNotFound(lobby.to_string()))?;
        let session = maps
            .by_id
            .get_mut(&id)
            .ok_or_else(|| DomainError::LobbyNotFound(lobby.to_string()))?;

        if session.locked {
            return Err(DomainError::LobbyLocked(lobby.to_string()).into());
        }
        if session.players.len() >= session.max_players {
            return Err(DomainError::LobbyFull(lobby.to_string()).into());
        }
        if session.players.iter().any(|p| p == player) {
            return Err(DomainError::PlayerAlreadyJoined {
                lobby: lobby.to_string(),
                player: player.to_string(),
            }
            .into());
        }

        session.players.push(player.to_string());
        if session.players.len() == session.max_players {
            session.locked = true;
            info!(%id, lobby, "game locked");
        }
        debug!(%id, lobby, player, "player joined");
        Ok(id)
    }

    /// Names of lobbies that still accept players.
    pub fn list_lobbies(&self) -> Result<Vec<String>> {
        let maps = self.maps.read()?;
        Ok(maps
            .by_id
            .values()
            .filter(|s| !s.locked)
            .map(|s| s.lobby.clone())
            .collect())
    }

    fn board(&self, id: Uuid) -> Result<Arc<Mutex<E::Board>>> {
        let maps = self.maps.read()?;
        maps.by_id
            .get(&id)
            .map(|s| Arc::clone(&s.board))
            .ok_or_else(|| DomainError::SessionNotFound(id).into())
    }

    /// Apply a move to the game's board.
    pub fn move_in_lobby(&self, id: Uuid, notation: &str) -> Result<MoveResult> {
        let board = self.board(id)?;
        let mut board = board.lock()?;
        self.engine
            .apply_move(&mut board, notation)
            .map_err(|e| {
                debug!(%id, error = %e, "move rejected");
                DomainError::IllegalMove(notation.to_string())
            })?;
        let outcome = self.engine.outcome(&board);
        if outcome.is_over() {
            info!(%id, %outcome, "game finished");
        }
        Ok(MoveResult {
            position: self.engine.serialize_position(&board),
            outcome,
        })
    }

    pub fn board_state(&self, id: Uuid) -> Result<String> {
        let board = self.board(id)?;
        let board = board.lock()?;
        Ok(self.engine.serialize_position(&board))
    }

    pub fn outcome(&self, id: Uuid) -> Result<Outcome> {
        let board = self.board(id)?;
        let board = board.lock()?;
        Ok(self.engine.outcome(&board))
    }

    pub fn session(&self, id: Uuid) -> Result<SessionInfo> {
        let maps = self.maps.read()?;
        maps.by_id
            .get(&id)
            .map(GameSession::info)
            .ok_or_else(|| DomainError::SessionNotFound(id).into())
    }

    pub fn len(&self) -> usize {
        self.maps.read().map(|m| m.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChessEngine;
    use crate::error::ProtocolError;

    fn domain(err: ProtocolError) -> DomainError {
        match err {
            ProtocolError::Domain(e) => e,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_lobby_rejected() {
        let games = GameRegistry::new(ChessEngine);
        let id = games.create_game("Alice", "Lobby-Alice").unwrap();
        let err = games.create_game("Eve", "Lobby-Alice").unwrap_err();
        assert_eq!(domain(err).code(), "lobby-exists");

        let info = games.session(id).unwrap();
        assert_eq!(info.creator, "Alice");
        assert_eq!(info.players, vec!["Alice".to_string()]);
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn test_join_locks_and_hides_lobby() {
        let games = GameRegistry::new(ChessEngine);
        let id = games.create_game("Alice", "Lobby-Alice").unwrap();
        assert_eq!(games.list_lobbies().unwrap(), vec!["Lobby-Alice".to_string()]);

        assert_eq!(games.join_game("Lobby-Alice", "Bob").unwrap(), id);
        assert!(games.session(id).unwrap().locked);
        assert!(games.list_lobbies().unwrap().is_empty());
    }

    #[test]
    fn test_join_failures_are_distinct() {
        let games = GameRegistry::with_max_players(ChessEngine, 3);
        games.create_game("Alice", "Lobby-Alice").unwrap();

        let missing = domain(games.join_game("Lobby-Nobody", "Bob").unwrap_err());
        assert_eq!(missing.code(), "lobby-not-found");

        let dup = domain(games.join_game("Lobby-Alice", "Alice").unwrap_err());
        assert_eq!(dup.code(), "player-already-joined");

        games.join_game("Lobby-Alice", "Bob").unwrap();
        games.join_game("Lobby-Alice", "Carol").unwrap();
        let locked = domain(games.join_game("Lobby-Alice", "Dave").unwrap_err());
        assert_eq!(locked.code(), "lobby-locked");
    }

    #[test]
    fn test_rejoin_locked_lobby_reports_locked() {
        let games = GameRegistry::new(ChessEngine);
        games.create_game("Alice", "Lobby-Alice").unwrap();
        games.join_game("Lobby-Alice", "Bob").unwrap();

        let again = domain(games.join_game("Lobby-Alice", "Bob").unwrap_err());
        assert_eq!(again.code(), "lobby-locked");
        let creator = domain(games.join_game("Lobby-Alice", "Alice").unwrap_err());
        assert_eq!(creator.code(), "lobby-locked");
    }

    #[test]
    fn test_moves() {
        let games = GameRegistry::new(ChessEngine);
        let id = games.create_game("Alice", "Lobby-Alice").unwrap();

        let result = games.move_in_lobby(id, "e2e4").unwrap();
        assert_eq!(
            result.position,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
        assert_eq!(result.outcome, Outcome::Ongoing);

        let err = games.move_in_lobby(id, "zz99").unwrap_err();
        assert_eq!(domain(err).code(), "illegal-move");
        assert_eq!(games.board_state(id).unwrap(), result.position);
    }

    #[test]
    fn test_unknown_session() {
        let games = GameRegistry::new(ChessEngine);
        let id = Uuid::new_v4();
        assert_eq!(domain(games.board_state(id).unwrap_err()).code(), "session-not-found");
        assert_eq!(
            domain(games.move_in_lobby(id, "e2e4").unwrap_err()).code(),
            "session-not-found"
        );
        assert!(games.outcome(id).is_err());
    }
}
