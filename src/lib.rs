//! docker-test-runner library
//!
//! Core of a test-execution service that runs untrusted, learner-submitted
//! code inside disposable Docker containers:
//! - Startup discovery of which language/test-framework images are runnable
//! - Bounded execution of one command per container, with nested inner and
//!   outer deadlines and guaranteed stop/remove teardown
//! - Structured composition of the container invocation

pub mod catalog;
pub mod command;
pub mod config;
pub mod runner;
pub mod shell;
