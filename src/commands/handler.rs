//! Command Handler Module
//!
//! Turns a tokenized shell line into a contract call on the active engine and
//! the result into a [`Reply`].
//!
//! ## Supported Commands
//!
//! ### Record Commands
//! - `SET key last first year city coins [EX seconds]` - Insert a record
//! - `GET key` - Show a record
//! - `EXISTS key` - Check if a key is live
//! - `DEL key` - Delete a record
//! - `UPDATE key last first year city coins` - Overwrite fields, `-` skips one
//! - `RENAME key newkey` - Move a record to another key
//! - `TTL key` - Seconds until a key expires
//!
//! ### Scan Commands
//! - `KEYS` - List every key
//! - `FIND last first year city coins` - Keys matching every given field
//! - `SHOWALL` - Every record as a table
//!
//! ### File Commands
//! - `UPLOAD path` - Load a dump file
//! - `EXPORT path` - Write a dump file
//!
//! ### Session Commands
//! - `DBSIZE`, `PING`, `QUIT` / `EXIT` / `Q`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  execute()  │───>│  dispatch() │───>│   cmd_*()   │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                    Box<dyn KeyValueStore>   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::StoreError;
use crate::protocol::Reply;
use crate::storage::{EngineKind, KeyValueStore, Record, RecordFilter, RecordPatch};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Placeholder that skips a field in UPDATE and FIND.
pub const SKIP: &str = "-";

/// Why a command could not run.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("wrong number of arguments for '{0}' command")]
    Arity(&'static str),

    #[error("unable to cast value \"{0}\" to type int")]
    NotAnInteger(String),

    #[error("wrong arg \"{0}\" it can only be \"EX/ex\"")]
    BadOption(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

type CmdResult = Result<Reply, CommandError>;

/// Executes shell commands against one engine.
pub struct CommandHandler {
    store: Box<dyn KeyValueStore>,
}

impl CommandHandler {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The engine behind this handler.
    pub fn kind(&self) -> EngineKind {
        self.store.kind()
    }

    /// Direct access to the engine, for work done outside the shell.
    pub fn store_mut(&mut self) -> &mut dyn KeyValueStore {
        self.store.as_mut()
    }

    /// Executes one tokenized command line.
    ///
    /// Argument and engine errors come back as [`Reply::Error`]; nothing here
    /// ends the session except an explicit QUIT.
    pub fn execute(&mut self, tokens: &[String]) -> Reply {
        let Some((name, args)) = tokens.split_first() else {
            return Reply::error("empty command");
        };

        let cmd = name.to_ascii_uppercase();
        match self.dispatch(&cmd, name, args) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(command = %cmd, error = %e, "Command failed");
                Reply::error(e.to_string())
            }
        }
    }

    fn dispatch(&mut self, cmd: &str, name: &str, args: &[String]) -> CmdResult {
        match cmd {
            // Record commands
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "EXISTS" => self.cmd_exists(args),
            "DEL" => self.cmd_del(args),
            "UPDATE" => self.cmd_update(args),
            "RENAME" => self.cmd_rename(args),
            "TTL" => self.cmd_ttl(args),

            // Scan commands
            "KEYS" => self.cmd_keys(args),
            "FIND" => self.cmd_find(args),
            "SHOWALL" => self.cmd_showall(args),

            // File commands
            "UPLOAD" => self.cmd_upload(args),
            "EXPORT" => self.cmd_export(args),

            // Session commands
            "DBSIZE" => self.cmd_dbsize(args),
            "PING" => Ok(Reply::Pong),
            "QUIT" | "EXIT" | "Q" => Ok(Reply::Quit),

            _ => Err(CommandError::Unknown(name.to_string())),
        }
    }

    // ========================================================================
    // Record Commands
    // ========================================================================

    /// SET key last first year city coins [EX seconds]
    fn cmd_set(&mut self, args: &[String]) -> CmdResult {
        if args.len() != 6 && args.len() != 8 {
            return Err(CommandError::Arity("set"));
        }

        let record = Record::new(
            args[0].as_str(),
            args[1].as_str(),
            args[2].as_str(),
            int(&args[3])?,
            args[4].as_str(),
            int(&args[5])?,
        );

        let ttl = match args.get(6) {
            // Zero or negative means the record never expires.
            Some(opt) if opt.eq_ignore_ascii_case("EX") => {
                u64::try_from(int::<i64>(&args[7])?).ok().filter(|&secs| secs > 0)
            }
            Some(opt) => return Err(CommandError::BadOption(opt.clone())),
            None => None,
        };

        // An existing key is kept as is.
        self.store.set(record, ttl)?;
        Ok(Reply::Ok)
    }

    /// GET key
    fn cmd_get(&mut self, args: &[String]) -> CmdResult {
        let [key] = args else {
            return Err(CommandError::Arity("get"));
        };

        Ok(match self.store.get(key) {
            Some(record) => Reply::Record(record.clone()),
            None => Reply::Null,
        })
    }

    /// EXISTS key
    fn cmd_exists(&mut self, args: &[String]) -> CmdResult {
        let [key] = args else {
            return Err(CommandError::Arity("exists"));
        };
        Ok(Reply::Bool(self.store.exists(key)))
    }

    /// DEL key
    fn cmd_del(&mut self, args: &[String]) -> CmdResult {
        let [key] = args else {
            return Err(CommandError::Arity("del"));
        };
        Ok(Reply::Bool(self.store.del(key)))
    }

    /// UPDATE key last first year city coins
    fn cmd_update(&mut self, args: &[String]) -> CmdResult {
        let [key, last_name, first_name, year, city, coins] = args else {
            return Err(CommandError::Arity("update"));
        };

        let patch = RecordPatch {
            last_name: text(last_name),
            first_name: text(first_name),
            year_of_birth: optional_int(year)?,
            city: text(city),
            coins: optional_int(coins)?,
        };

        Ok(if self.store.update(key, &patch) {
            Reply::Ok
        } else {
            Reply::Null
        })
    }

    /// RENAME key newkey
    fn cmd_rename(&mut self, args: &[String]) -> CmdResult {
        let [old, new] = args else {
            return Err(CommandError::Arity("rename"));
        };

        Ok(if self.store.rename(old, new)? {
            Reply::Ok
        } else {
            Reply::Null
        })
    }

    /// TTL key
    fn cmd_ttl(&mut self, args: &[String]) -> CmdResult {
        let [key] = args else {
            return Err(CommandError::Arity("ttl"));
        };

        if !self.store.exists(key) {
            return Ok(Reply::Null);
        }
        Ok(match self.store.ttl(key) {
            0 => Reply::Ttl(None),
            secs => Reply::Ttl(Some(secs)),
        })
    }

    // ========================================================================
    // Scan Commands
    // ========================================================================

    /// KEYS
    fn cmd_keys(&mut self, args: &[String]) -> CmdResult {
        if !args.is_empty() {
            return Err(CommandError::Arity("keys"));
        }
        Ok(Reply::Keys(self.store.keys()))
    }

    /// FIND [last [first [year [city [coins]]]]]
    ///
    /// Missing trailing fields are skipped like `-`.
    fn cmd_find(&mut self, args: &[String]) -> CmdResult {
        if args.len() > 5 {
            return Err(CommandError::Arity("find"));
        }

        let arg = |i: usize| args.get(i).map_or(SKIP, String::as_str);
        let filter = RecordFilter {
            last_name: text(arg(0)),
            first_name: text(arg(1)),
            year_of_birth: optional_int(arg(2))?,
            city: text(arg(3)),
            coins: optional_int(arg(4))?,
        };

        Ok(Reply::Keys(self.store.find(&filter)))
    }

    /// SHOWALL
    fn cmd_showall(&mut self, args: &[String]) -> CmdResult {
        if !args.is_empty() {
            return Err(CommandError::Arity("showall"));
        }
        let rows = self.store.show_all().into_iter().cloned().collect();
        Ok(Reply::Table(rows))
    }

    // ========================================================================
    // File Commands
    // ========================================================================

    /// UPLOAD path
    fn cmd_upload(&mut self, args: &[String]) -> CmdResult {
        let [path] = args else {
            return Err(CommandError::Arity("upload"));
        };
        Ok(Reply::Integer(self.store.upload(Path::new(path)) as i64))
    }

    /// EXPORT path
    fn cmd_export(&mut self, args: &[String]) -> CmdResult {
        let [path] = args else {
            return Err(CommandError::Arity("export"));
        };
        Ok(Reply::Integer(self.store.export(Path::new(path)) as i64))
    }

    // ========================================================================
    // Session Commands
    // ========================================================================

    /// DBSIZE
    fn cmd_dbsize(&mut self, args: &[String]) -> CmdResult {
        if !args.is_empty() {
            return Err(CommandError::Arity("dbsize"));
        }
        Ok(Reply::Integer(self.store.count() as i64))
    }
}

fn int<T: FromStr>(arg: &str) -> Result<T, CommandError> {
    arg.parse()
        .map_err(|_| CommandError::NotAnInteger(arg.to_string()))
}

fn optional_int<T: FromStr>(arg: &str) -> Result<Option<T>, CommandError> {
    if arg == SKIP {
        return Ok(None);
    }
    int(arg).map(Some)
}

fn text(arg: &str) -> Option<String> {
    (arg != SKIP).then(|| arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tokenize;
    use crate::storage::{open, Clock, HashTableStore, ManualClock, TreeStore};
    use std::time::Duration;

    const KINDS: [EngineKind; 2] = [EngineKind::HashTable, EngineKind::Tree];

    fn create_handler(kind: EngineKind) -> CommandHandler {
        CommandHandler::new(open(kind))
    }

    fn run(handler: &mut CommandHandler, line: &str) -> Reply {
        handler.execute(&tokenize(line))
    }

    /// Every field of a GET reply. Record equality only looks at the key.
    fn row(handler: &mut CommandHandler, key: &str) -> Option<String> {
        match run(handler, &format!("GET {key}")) {
            Reply::Record(record) => Some(record.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_ping_and_quit() {
        let mut handler = create_handler(EngineKind::Tree);
        assert_eq!(run(&mut handler, "ping"), Reply::Pong);
        assert_eq!(run(&mut handler, "QUIT"), Reply::Quit);
        assert_eq!(run(&mut handler, "exit"), Reply::Quit);
        assert_eq!(run(&mut handler, "q"), Reply::Quit);
    }

    #[test]
    fn test_set_get() {
        for kind in KINDS {
            let mut handler = create_handler(kind);

            assert_eq!(run(&mut handler, "SET k1 Smith John 1990 Paris 150"), Reply::Ok);
            assert_eq!(
                row(&mut handler, "k1"),
                Some(Record::new("k1", "Smith", "John", 1990, "Paris", 150).to_string())
            );
            assert_eq!(run(&mut handler, "GET nope"), Reply::Null);

            // kept, not overwritten
            assert_eq!(run(&mut handler, "set k1 Doe Jane 1985 Rome 1"), Reply::Ok);
            let Reply::Record(record) = run(&mut handler, "get k1") else {
                panic!("expected a record");
            };
            assert_eq!(record.last_name, "Smith");
        }
    }

    #[test]
    fn test_set_validation() {
        let mut handler = create_handler(EngineKind::HashTable);

        assert!(run(&mut handler, "SET k1 Smith John 1990 Paris").is_error());
        assert_eq!(
            run(&mut handler, "SET k1 Smith John year Paris 1"),
            Reply::error("unable to cast value \"year\" to type int")
        );
        assert_eq!(
            run(&mut handler, "SET k1 Smith John 1990 Paris 1 PX 10"),
            Reply::error("wrong arg \"PX\" it can only be \"EX/ex\"")
        );
        assert!(run(&mut handler, "SET k1 Smith John 1990 Paris 1 EX soon").is_error());
        assert!(run(&mut handler, "SET k1 Smith John 1990 Paris 1 EX 1.5").is_error());
        assert_eq!(run(&mut handler, "SET k1 Smith John 1990 Paris 1 ex 10"), Reply::Ok);
        assert_eq!(run(&mut handler, "DBSIZE"), Reply::Integer(1));
    }

    #[test]
    fn test_exists_del() {
        for kind in KINDS {
            let mut handler = create_handler(kind);
            run(&mut handler, "SET k1 Smith John 1990 Paris 150");

            assert_eq!(run(&mut handler, "EXISTS k1"), Reply::Bool(true));
            assert_eq!(run(&mut handler, "DEL k1"), Reply::Bool(true));
            assert_eq!(run(&mut handler, "DEL k1"), Reply::Bool(false));
            assert_eq!(run(&mut handler, "EXISTS k1"), Reply::Bool(false));
            assert!(run(&mut handler, "EXISTS").is_error());
        }
    }

    #[test]
    fn test_update_skips_dashes() {
        for kind in KINDS {
            let mut handler = create_handler(kind);
            run(&mut handler, "SET k1 Smith John 1990 Paris 150");

            assert_eq!(run(&mut handler, "UPDATE k1 - - - Rome -"), Reply::Ok);
            assert_eq!(
                row(&mut handler, "k1"),
                Some(Record::new("k1", "Smith", "John", 1990, "Rome", 150).to_string())
            );

            assert_eq!(run(&mut handler, "UPDATE k1 Doe Jane 1985 - 7"), Reply::Ok);
            assert_eq!(
                row(&mut handler, "k1"),
                Some(Record::new("k1", "Doe", "Jane", 1985, "Rome", 7).to_string())
            );

            assert_eq!(run(&mut handler, "UPDATE ghost - - - Rome -"), Reply::Null);
            assert!(run(&mut handler, "UPDATE k1 - - x - -").is_error());
            assert!(run(&mut handler, "UPDATE k1 Doe").is_error());
        }
    }

    #[test]
    fn test_keys_and_rename() {
        let mut handler = create_handler(EngineKind::Tree);
        run(&mut handler, "SET b Smith John 1990 Paris 1");
        run(&mut handler, "SET a Smith John 1990 Paris 1");

        assert_eq!(
            run(&mut handler, "KEYS"),
            Reply::Keys(vec!["a".to_string(), "b".to_string()])
        );

        assert_eq!(run(&mut handler, "RENAME a c"), Reply::Ok);
        assert_eq!(run(&mut handler, "RENAME a d"), Reply::Null);
        assert_eq!(
            run(&mut handler, "KEYS"),
            Reply::Keys(vec!["b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_ttl_replies() {
        let clock = ManualClock::new();
        let store = TreeStore::with_clock(Clock::Manual(clock.clone()));
        let mut handler = CommandHandler::new(Box::new(store));

        run(&mut handler, "SET temp Smith John 1990 Paris 1 EX 2");
        run(&mut handler, "SET perm Smith John 1990 Paris 1");

        assert_eq!(run(&mut handler, "TTL temp"), Reply::Ttl(Some(2)));
        assert_eq!(run(&mut handler, "TTL perm"), Reply::Ttl(None));
        assert_eq!(run(&mut handler, "TTL ghost"), Reply::Null);

        clock.advance(Duration::from_secs(2));
        assert_eq!(run(&mut handler, "TTL temp"), Reply::Null);
        assert_eq!(run(&mut handler, "GET temp"), Reply::Null);
    }

    #[test]
    fn test_non_positive_ex_never_expires() {
        for kind in KINDS {
            let mut handler = create_handler(kind);

            assert_eq!(run(&mut handler, "SET neg Smith John 1990 Paris 1 EX -5"), Reply::Ok);
            assert_eq!(run(&mut handler, "SET zero Smith John 1990 Paris 1 ex 0"), Reply::Ok);

            assert_eq!(run(&mut handler, "EXISTS neg"), Reply::Bool(true));
            assert_eq!(run(&mut handler, "TTL neg"), Reply::Ttl(None));
            assert_eq!(run(&mut handler, "TTL zero"), Reply::Ttl(None));
        }
    }

    #[test]
    fn test_dbsize_skips_expired() {
        let clock = ManualClock::new();
        let store = HashTableStore::with_clock(Clock::Manual(clock.clone()));
        let mut handler = CommandHandler::new(Box::new(store));

        run(&mut handler, "SET x Smith John 1990 Paris 1 EX 1");
        run(&mut handler, "SET y Smith John 1990 Paris 1");
        assert_eq!(run(&mut handler, "DBSIZE"), Reply::Integer(2));

        clock.advance(Duration::from_secs(2));
        assert_eq!(run(&mut handler, "DBSIZE"), Reply::Integer(1));
        assert_eq!(run(&mut handler, "KEYS"), Reply::Keys(vec!["y".to_string()]));
    }

    #[test]
    fn test_find() {
        for kind in KINDS {
            let mut handler = create_handler(kind);
            run(&mut handler, "SET a Smith John 1990 Paris 1");
            run(&mut handler, "SET b Doe Jane 1990 Rome 2");
            run(&mut handler, "SET c Smith Anna 1985 Rome 3");

            let Reply::Keys(mut keys) = run(&mut handler, "FIND Smith") else {
                panic!("expected keys");
            };
            keys.sort();
            assert_eq!(keys, vec!["a", "c"]);

            assert_eq!(
                run(&mut handler, "FIND - - 1990 Rome"),
                Reply::Keys(vec!["b".to_string()])
            );
            assert_eq!(run(&mut handler, "FIND - - - - 3"), Reply::Keys(vec!["c".to_string()]));
            assert_eq!(run(&mut handler, "FIND Nobody"), Reply::Keys(Vec::new()));
            assert!(run(&mut handler, "FIND - - year").is_error());
            assert!(run(&mut handler, "FIND a b 1 c 2 extra").is_error());
        }
    }

    #[test]
    fn test_showall() {
        let mut handler = create_handler(EngineKind::Tree);
        run(&mut handler, "SET b Doe Jane 1985 Rome 2");
        run(&mut handler, "SET a Smith John 1990 Paris 1");

        let Reply::Table(rows) = run(&mut handler, "SHOWALL") else {
            panic!("expected a table");
        };
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(run(&mut handler, "SHOWALL now").is_error());
    }

    #[test]
    fn test_export_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.dat");
        let path = path.to_str().unwrap();

        let mut source = create_handler(EngineKind::HashTable);
        run(&mut source, "SET a Smith John 1990 Paris 1");
        run(&mut source, "SET b Doe Jane 1985 Rome 2");
        assert_eq!(run(&mut source, &format!("EXPORT {path}")), Reply::Integer(2));

        let mut target = create_handler(EngineKind::Tree);
        assert_eq!(run(&mut target, &format!("UPLOAD {path}")), Reply::Integer(2));
        assert_eq!(run(&mut target, "DBSIZE"), Reply::Integer(2));
        assert_eq!(run(&mut target, "UPLOAD /no/such/file.dat"), Reply::Integer(0));
    }

    #[test]
    fn test_unknown_command() {
        let mut handler = create_handler(EngineKind::HashTable);
        assert_eq!(
            run(&mut handler, "FLUSHALL now"),
            Reply::error("unknown command 'FLUSHALL'")
        );
        assert_eq!(run(&mut handler, ""), Reply::error("empty command"));
    }

    #[test]
    fn test_capacity_error_is_reported() {
        let mut handler = CommandHandler::new(Box::new(TreeStore::with_node_limit(1)));
        assert_eq!(run(&mut handler, "SET a Smith John 1990 Paris 1"), Reply::Ok);

        let reply = run(&mut handler, "SET b Smith John 1990 Paris 1");
        assert_eq!(reply, Reply::error("tree is full: node limit of 1 reached"));
        assert_eq!(handler.kind(), EngineKind::Tree);
    }
}
