mod common;
mod fees;
mod lifecycle;
mod numbering;
mod service;
mod sqlite;
