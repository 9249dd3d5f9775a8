mod build_tests;
mod common;
mod stash_tests;
