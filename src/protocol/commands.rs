//! Command dispatch table
//!
//! A mapping from uppercased verb to its descriptor, built once per server
//! and never mutated afterwards, so lookup needs no synchronization. Each
//! descriptor carries the handler and whether the verb is permitted before
//! authentication.
//!
//! `CommandSet::baseline` covers the session-level verbs and minimal data
//! verbs; an embedding server extends or replaces entries with `register`
//! before serving (data-mode setup like PASV/PORT is the usual candidate).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::CommandError;
use crate::protocol::handlers;
use crate::session::ClientSession;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>>;

/// A handler borrows the session exclusively for the duration of one command.
pub type CommandHandler = for<'a> fn(&'a mut ClientSession) -> HandlerFuture<'a>;

pub struct CommandDescriptor {
    pub handler: CommandHandler,
    /// Permitted while the session is still unauthenticated.
    pub open: bool,
}

/// The verb table one server dispatches from. Shared read-only by all of its
/// sessions once serving starts.
pub struct CommandSet {
    table: HashMap<String, CommandDescriptor>,
}

impl CommandSet {
    /// The built-in verbs.
    pub fn baseline() -> Self {
        let mut set = Self { table: HashMap::new() };

        // Login and negotiation verbs, usable before authentication.
        set.register("USER", CommandDescriptor { handler: handlers::cmd_user, open: true });
        set.register("PASS", CommandDescriptor { handler: handlers::cmd_pass, open: true });
        set.register("QUIT", CommandDescriptor { handler: handlers::cmd_quit, open: true });
        set.register("NOOP", CommandDescriptor { handler: handlers::cmd_noop, open: true });
        set.register("SYST", CommandDescriptor { handler: handlers::cmd_syst, open: true });
        set.register("FEAT", CommandDescriptor { handler: handlers::cmd_feat, open: true });
        set.register("PBSZ", CommandDescriptor { handler: handlers::cmd_pbsz, open: true });
        set.register("PROT", CommandDescriptor { handler: handlers::cmd_prot, open: true });

        // Everything below requires a logged-in user.
        set.register("TYPE", CommandDescriptor { handler: handlers::cmd_type, open: false });
        set.register("MODE", CommandDescriptor { handler: handlers::cmd_mode, open: false });
        set.register("STRU", CommandDescriptor { handler: handlers::cmd_stru, open: false });
        set.register("PWD", CommandDescriptor { handler: handlers::cmd_pwd, open: false });
        set.register("CWD", CommandDescriptor { handler: handlers::cmd_cwd, open: false });
        set.register("CDUP", CommandDescriptor { handler: handlers::cmd_cdup, open: false });
        set.register("REST", CommandDescriptor { handler: handlers::cmd_rest, open: false });
        set.register("RNFR", CommandDescriptor { handler: handlers::cmd_rnfr, open: false });
        set.register("RNTO", CommandDescriptor { handler: handlers::cmd_rnto, open: false });

        // Data verbs: gated like any privileged verb; the built-in bodies
        // drive the transfer lifecycle but move no bytes, embedding servers
        // replace them with handlers that do.
        set.register("PASV", CommandDescriptor { handler: handlers::cmd_pasv, open: false });
        set.register("PORT", CommandDescriptor { handler: handlers::cmd_port, open: false });
        set.register("RETR", CommandDescriptor { handler: handlers::cmd_retr, open: false });
        set.register("STOR", CommandDescriptor { handler: handlers::cmd_stor, open: false });
        set.register("LIST", CommandDescriptor { handler: handlers::cmd_list, open: false });

        set
    }

    /// Adds or replaces a verb. Stored uppercased, matching how the
    /// dispatcher case-folds before lookup.
    pub fn register(&mut self, verb: &str, descriptor: CommandDescriptor) {
        self.table.insert(verb.to_ascii_uppercase(), descriptor);
    }

    /// Looks up the descriptor for an already-uppercased verb.
    pub fn lookup(&self, verb: &str) -> Option<&CommandDescriptor> {
        self.table.get(verb)
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::baseline()
    }
}
