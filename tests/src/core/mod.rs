mod assembly;
mod cursor;
mod pattern;
