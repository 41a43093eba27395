//! Unit test suite entry point.

mod cli_command_parse_tests;
mod config_tests;
mod skill_parse_tests;
