pub mod calendar;
pub mod feed;
pub mod init;
pub mod matcher;
pub mod notifications;
pub mod telegram;
