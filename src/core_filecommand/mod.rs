pub mod command;
pub mod dicom;
pub mod directories;
pub mod filesystem;
pub mod getfilelist;
pub mod handlers;
pub mod readfile;
pub mod restart;
pub mod uploadfile;
