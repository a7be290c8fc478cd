mod controls;
mod details;
mod dialog;
mod panels;
