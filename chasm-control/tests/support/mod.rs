pub mod fixture_daemon;
