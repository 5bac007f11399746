//! Baseline command handlers
//!
//! Handlers for the session-level verbs: login, negotiation, working
//! directory, and the two-step rename / restart-offset scratch state.
//! The data verbs (RETR, STOR, LIST, PASV, PORT) ship as minimal bodies
//! that enforce gating and the transfer response ordering but move no
//! bytes; an embedding server registers replacements on its `CommandSet`
//! together with its `TransferConnection` implementations.
//!
//! Handlers return `Err` only for genuine faults (driver I/O failures,
//! broken control writes); expected rejections are written to the client
//! with their proper status code and the handler returns `Ok`.

use log::info;

use crate::error::{CommandError, DriverError, TransferError};
use crate::protocol::commands::HandlerFuture;
use crate::protocol::responses;
use crate::session::ClientSession;

pub(crate) fn cmd_user(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        let name = session.param().to_string();
        if name.is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A user name is required")
                .await?;
            return Ok(());
        }
        session.set_user(name);
        session
            .write_message(responses::PASSWORD_REQUIRED, "User name okay, need password")
            .await?;
        Ok(())
    })
}

pub(crate) fn cmd_pass(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        if session.user().is_empty() {
            session
                .write_message(responses::BAD_SEQUENCE, "Send USER first")
                .await?;
            return Ok(());
        }
        let password = session.param().to_string();
        let info = session.info();
        let driver = session.server_driver();
        match driver.authenticate_user(&info, &info.user, &password).await {
            Ok(client_driver) => {
                session.attach_driver(client_driver);
                info!("client {}: user {} logged in", session.id(), session.user());
                session
                    .write_message(responses::LOGIN_SUCCESS, "Password ok, continue")
                    .await?;
            }
            Err(DriverError::Rejected(reason)) => {
                info!("client {}: login refused: {}", session.id(), reason);
                session.write_message(responses::NOT_LOGGED_IN, &reason).await?;
            }
            Err(fault) => return Err(CommandError::Driver(fault)),
        }
        Ok(())
    })
}

pub(crate) fn cmd_quit(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session.write_message(responses::CLOSING, "Goodbye").await?;
        session.request_close();
        Ok(())
    })
}

pub(crate) fn cmd_noop(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session.write_message(responses::OK, "OK").await?;
        Ok(())
    })
}

pub(crate) fn cmd_syst(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session
            .write_message(responses::SYSTEM_TYPE, "UNIX Type: L8")
            .await?;
        Ok(())
    })
}

pub(crate) fn cmd_feat(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session.write_line("211-Features:").await?;
        session.write_line(" UTF8").await?;
        session.write_line(" REST STREAM").await?;
        session.write_message(responses::FEATURES, "End").await?;
        Ok(())
    })
}

pub(crate) fn cmd_pbsz(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        // Only a zero buffer size makes sense on a stream channel.
        session.write_message(responses::OK, "PBSZ=0").await?;
        Ok(())
    })
}

pub(crate) fn cmd_prot(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        match session.param().to_ascii_uppercase().as_str() {
            "P" => {
                session.set_transfer_tls(true);
                session
                    .write_message(responses::OK, "Transfers will be protected")
                    .await?;
            }
            "C" => {
                session.set_transfer_tls(false);
                session
                    .write_message(responses::OK, "Transfers will be in clear")
                    .await?;
            }
            _ => {
                session
                    .write_message(responses::UNSUPPORTED_PARAMETER, "Unsupported protection level")
                    .await?;
            }
        }
        Ok(())
    })
}

pub(crate) fn cmd_type(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        match session.param().to_ascii_uppercase().as_str() {
            "A" => session.write_message(responses::OK, "Type set to ASCII").await?,
            "I" => session.write_message(responses::OK, "Type set to binary").await?,
            "" => {
                session
                    .write_message(responses::SYNTAX_ERROR, "A type is required")
                    .await?
            }
            _ => {
                session
                    .write_message(responses::UNSUPPORTED_PARAMETER, "Unknown TYPE")
                    .await?
            }
        }
        Ok(())
    })
}

pub(crate) fn cmd_mode(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        if session.param().eq_ignore_ascii_case("S") {
            session.write_message(responses::OK, "Mode set to stream").await?;
        } else {
            session
                .write_message(responses::UNSUPPORTED_PARAMETER, "Only stream mode is supported")
                .await?;
        }
        Ok(())
    })
}

pub(crate) fn cmd_stru(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        if session.param().eq_ignore_ascii_case("F") {
            session.write_message(responses::OK, "File structure").await?;
        } else {
            session
                .write_message(responses::UNSUPPORTED_PARAMETER, "Only file structure is supported")
                .await?;
        }
        Ok(())
    })
}

pub(crate) fn cmd_pwd(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        let message = format!("\"{}\" is the current directory", session.path());
        session.write_message(responses::PATH_INFO, &message).await?;
        Ok(())
    })
}

pub(crate) fn cmd_cwd(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        let target = session.param().to_string();
        if target.is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A directory is required")
                .await?;
            return Ok(());
        }
        change_directory(session, &target).await
    })
}

pub(crate) fn cmd_cdup(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move { change_directory(session, "..").await })
}

async fn change_directory(session: &mut ClientSession, target: &str) -> Result<(), CommandError> {
    let driver = session.client_driver()?;
    let info = session.info();
    let current = session.path().to_string();
    let changed = driver.change_directory(&info, &current, target).await;
    match changed {
        Ok(new_path) => {
            session.set_path(new_path);
            session
                .write_message(responses::FILE_ACTION_OK, "Directory changed")
                .await?;
        }
        Err(DriverError::Rejected(reason)) => {
            session.write_message(responses::ACTION_NOT_TAKEN, &reason).await?;
        }
        Err(fault) => return Err(CommandError::Driver(fault)),
    }
    Ok(())
}

pub(crate) fn cmd_pasv(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session
            .write_message(responses::NOT_IMPLEMENTED, "Command not implemented")
            .await?;
        Ok(())
    })
}

pub(crate) fn cmd_port(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        session
            .write_message(responses::NOT_IMPLEMENTED, "Command not implemented")
            .await?;
        Ok(())
    })
}

pub(crate) fn cmd_retr(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        if session.param().is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A file path is required")
                .await?;
            return Ok(());
        }
        run_data_transfer(session).await
    })
}

pub(crate) fn cmd_stor(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        if session.param().is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A file path is required")
                .await?;
            return Ok(());
        }
        run_data_transfer(session).await
    })
}

pub(crate) fn cmd_list(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move { run_data_transfer(session).await })
}

/// Built-in data-verb body: drives the full transfer lifecycle but streams
/// nothing. With no declared transfer connection this refuses with the `550`
/// written by `transfer_open`; with one attached it opens and immediately
/// closes it (`150` then `226`).
async fn run_data_transfer(session: &mut ClientSession) -> Result<(), CommandError> {
    let opened = session.transfer_open().await;
    match opened {
        Ok(socket) => {
            drop(socket);
            session.transfer_close().await?;
            Ok(())
        }
        Err(TransferError::NotDeclared) => Ok(()),
        Err(fault) => Err(CommandError::Transfer(fault)),
    }
}

pub(crate) fn cmd_rest(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        match session.param().parse::<u64>() {
            Ok(offset) => {
                session.set_restart_offset(offset);
                let message = format!("Restarting at {}. Send STOR or RETR to resume", offset);
                session.write_message(responses::NEED_MORE_INFO, &message).await?;
            }
            Err(_) => {
                session
                    .write_message(responses::SYNTAX_ERROR, "Restart offset must be numeric")
                    .await?;
            }
        }
        Ok(())
    })
}

pub(crate) fn cmd_rnfr(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        let source = session.param().to_string();
        if source.is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A source path is required")
                .await?;
            return Ok(());
        }
        session.set_rename_from(Some(source));
        session
            .write_message(responses::NEED_MORE_INFO, "Sure, give me a target")
            .await?;
        Ok(())
    })
}

pub(crate) fn cmd_rnto(session: &mut ClientSession) -> HandlerFuture<'_> {
    Box::pin(async move {
        let target = session.param().to_string();
        if target.is_empty() {
            session
                .write_message(responses::SYNTAX_ERROR, "A target path is required")
                .await?;
            return Ok(());
        }
        let Some(source) = session.take_rename_from() else {
            session
                .write_message(responses::BAD_SEQUENCE, "Send RNFR first")
                .await?;
            return Ok(());
        };
        let driver = session.client_driver()?;
        let info = session.info();
        match driver.rename(&info, &source, &target).await {
            Ok(()) => {
                session
                    .write_message(responses::FILE_ACTION_OK, "File renamed")
                    .await?;
            }
            Err(DriverError::Rejected(reason)) => {
                session.write_message(responses::ACTION_NOT_TAKEN, &reason).await?;
            }
            Err(fault) => return Err(CommandError::Driver(fault)),
        }
        Ok(())
    })
}
