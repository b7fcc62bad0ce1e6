mod icmp;
mod support;
mod tcp;
