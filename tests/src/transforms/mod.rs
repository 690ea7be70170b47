mod documents;
mod engine;
