mod activity;
mod config;
mod http;
mod recovery;
mod update;
