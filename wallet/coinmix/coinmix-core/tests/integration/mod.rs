mod mixing_flow;
mod node_gossip;
mod session_rejections;
